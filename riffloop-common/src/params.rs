//! Composition parameters
//!
//! Scalars handed over alongside the resolved plan. Every field has a
//! built-in default so a plan can deserialize from a sparse source.

use serde::Deserialize;

/// Knobs shared by the timeline and voice composers
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeParams {
    /// Silent lead-in, in beats (quarter notes), prepended to both the
    /// chart and every audio voice
    #[serde(default = "default_lead_in_beats")]
    pub lead_in_beats: f64,

    /// Sub-sample nudge added to the lead-in delay, in samples
    #[serde(default)]
    pub samples_offset: i64,

    /// Drift-correction divisor: each audio region's end is stretched by
    /// `(end - start) / drift_factor` seconds. 0 disables.
    ///
    /// An empirically tuned linear correction for cumulative encoder drift
    /// over long concatenations; a policy knob, not settled physics.
    #[serde(default)]
    pub drift_factor: f64,

    /// Default measure-grouping quantization applied to parts that do not
    /// set their own
    #[serde(default)]
    pub quantize: Option<u32>,

    /// Clip note/sustain extents at part boundaries
    #[serde(default = "default_true")]
    pub clamp_durations: bool,

    /// Insert corrective tempo/signature events at part boundaries
    #[serde(default = "default_true")]
    pub insert_sync: bool,

    /// Sample rate used for generated silence when no real audio of a voice
    /// exists in the composition
    #[serde(default = "default_nominal_sample_rate")]
    pub nominal_sample_rate: u32,

    /// Compose the chart only; produce no render plans
    #[serde(default)]
    pub ignore_audio: bool,
}

fn default_lead_in_beats() -> f64 {
    8.0
}

fn default_true() -> bool {
    true
}

fn default_nominal_sample_rate() -> u32 {
    44100
}

impl Default for ComposeParams {
    fn default() -> Self {
        ComposeParams {
            lead_in_beats: default_lead_in_beats(),
            samples_offset: 0,
            drift_factor: 0.0,
            quantize: None,
            clamp_durations: true,
            insert_sync: true,
            nominal_sample_rate: default_nominal_sample_rate(),
            ignore_audio: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ComposeParams::default();
        assert_eq!(params.lead_in_beats, 8.0);
        assert_eq!(params.samples_offset, 0);
        assert_eq!(params.drift_factor, 0.0);
        assert_eq!(params.quantize, None);
        assert!(params.clamp_durations);
        assert!(params.insert_sync);
        assert_eq!(params.nominal_sample_rate, 44100);
        assert!(!params.ignore_audio);
    }

    #[test]
    fn test_sparse_deserialization_uses_defaults() {
        let params: ComposeParams = serde_json::from_str(r#"{"lead_in_beats": 4.0}"#).unwrap();
        assert_eq!(params.lead_in_beats, 4.0);
        assert!(params.clamp_durations);
        assert_eq!(params.nominal_sample_rate, 44100);
    }

    #[test]
    fn test_full_deserialization() {
        let params: ComposeParams = serde_json::from_str(
            r#"{
                "lead_in_beats": 2.0,
                "samples_offset": -3,
                "drift_factor": 53862.08,
                "quantize": 4,
                "clamp_durations": false,
                "insert_sync": false,
                "nominal_sample_rate": 48000,
                "ignore_audio": true
            }"#,
        )
        .unwrap();
        assert_eq!(params.samples_offset, -3);
        assert_eq!(params.quantize, Some(4));
        assert!(!params.clamp_durations);
        assert!(params.ignore_audio);
        assert_eq!(params.nominal_sample_rate, 48000);
    }
}
