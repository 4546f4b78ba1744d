//! Shared time-base math
//!
//! riffloop juggles three time units:
//!
//! 1. **Ticks**: i64 chart positions, scaled by a per-chart resolution
//!    (ticks per quarter note)
//! 2. **Seconds**: f64 wall-clock time, derived through a chart's tempo map
//! 3. **Samples**: i64 audio frame counts at a stem's sample rate
//!
//! Tick <-> seconds conversion needs a tempo map and lives on
//! [`crate::chart::Chart`]. Everything tempo-independent lives here so the
//! timeline and voice composers share one set of conversions.
//!
//! Rescaling between chart resolutions rounds to the nearest tick. For
//! non-integral ratios this loses up to half a tick per value; that drift
//! is accepted and documented, not corrected.

/// Chart position or duration in ticks
pub type Tick = i64;

/// Default tempo when a chart has no tempo event yet: 120 BPM, stored as
/// milli-BPM the way chart sync tracks store it
pub const DEFAULT_MILLIBPM: u32 = 120_000;

/// Default time signature numerator
pub const DEFAULT_SIGNATURE: u32 = 4;

/// Rescale a tick value between two resolutions, rounding to nearest
///
/// # Examples
///
/// ```
/// use riffloop_common::timebase::rescale_tick;
///
/// assert_eq!(rescale_tick(192, 192, 480), 480);
/// assert_eq!(rescale_tick(96, 192, 480), 240);
/// assert_eq!(rescale_tick(1, 192, 480), 3); // 2.5 rounds up
/// ```
pub fn rescale_tick(tick: Tick, from_resolution: u32, to_resolution: u32) -> Tick {
    assert!(from_resolution > 0, "from_resolution must be > 0");
    ((tick as f64) * (to_resolution as f64) / (from_resolution as f64)).round() as Tick
}

/// Floor a tick to the nearest multiple of `resolution * measures`
///
/// Used for measure quantization of part boundaries. A `measures` grouping
/// of 1 snaps to quarter notes, 4 snaps to whole 4/4 measures, and so on.
pub fn quantize_floor(tick: Tick, resolution: u32, measures: u32) -> Tick {
    let grid = resolution as Tick * measures as Tick;
    if grid == 0 {
        return tick;
    }
    (tick.div_euclid(grid)) * grid
}

/// Duration of one beat (quarter note) in milliseconds at a given tempo
pub fn beat_ms(millibpm: u32) -> f64 {
    60_000.0 / (millibpm as f64 / 1000.0)
}

/// Silent lead-in duration in milliseconds
///
/// The lead-in is configured in beats and lasts `lead_in_beats` beats at
/// the tempo in effect at the first part's start.
pub fn lead_in_delay_ms(lead_in_beats: f64, millibpm: u32) -> f64 {
    lead_in_beats * beat_ms(millibpm)
}

/// Convert milliseconds to seconds
pub fn ms_to_seconds(ms: f64) -> f64 {
    ms / 1000.0
}

/// Convert a duration in seconds to a frame count at a sample rate,
/// rounding to nearest
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> i64 {
    (seconds * sample_rate as f64).round() as i64
}

/// Convert a frame count at a sample rate to seconds
pub fn samples_to_seconds(samples: i64, sample_rate: u32) -> f64 {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    samples as f64 / sample_rate as f64
}
