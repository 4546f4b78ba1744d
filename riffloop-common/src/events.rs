//! Render progress event types
//!
//! Each render task owns a typed progress channel; the render driver fans
//! the per-voice channels into one receiver and folds the events into a
//! [`ProgressReport`]. Events are plain data so they can be logged or
//! serialized for an outer surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One progress event from a render task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderEvent {
    /// Voice (stem) name this event belongs to
    pub voice: String,
    /// What happened
    pub kind: RenderEventKind,
    /// Emission time
    pub timestamp: DateTime<Utc>,
}

/// Render task lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderEventKind {
    /// Task started executing its plan
    Started,
    /// Rendered output advanced to this many seconds
    Progress { rendered_seconds: f64 },
    /// Plan fully rendered and output file written
    Completed,
    /// Task failed; message carries the renderer's diagnosis
    Failed { message: String },
}

impl RenderEvent {
    /// Build an event stamped with the current time
    pub fn now(voice: impl Into<String>, kind: RenderEventKind) -> Self {
        RenderEvent {
            voice: voice.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Per-voice progress state tracked by the driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceProgress {
    /// Seconds of audio expected from this voice's plan
    pub expected_seconds: f64,
    /// Seconds rendered so far
    pub rendered_seconds: f64,
    /// Task finished successfully
    pub completed: bool,
    /// Failure message, if the task failed
    pub failed: Option<String>,
}

/// Aggregate progress over all render tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Per-voice state
    pub voices: BTreeMap<String, VoiceProgress>,
}

impl ProgressReport {
    /// Initialize the report with each voice's expected duration
    pub fn new(expected: impl IntoIterator<Item = (String, f64)>) -> Self {
        ProgressReport {
            voices: expected
                .into_iter()
                .map(|(voice, expected_seconds)| {
                    (
                        voice,
                        VoiceProgress {
                            expected_seconds,
                            ..VoiceProgress::default()
                        },
                    )
                })
                .collect(),
        }
    }

    /// Fold one event into the report
    pub fn apply(&mut self, event: &RenderEvent) {
        let voice = self.voices.entry(event.voice.clone()).or_default();
        match &event.kind {
            RenderEventKind::Started => {}
            RenderEventKind::Progress { rendered_seconds } => {
                voice.rendered_seconds = *rendered_seconds;
            }
            RenderEventKind::Completed => {
                voice.completed = true;
                voice.rendered_seconds = voice.expected_seconds;
            }
            RenderEventKind::Failed { message } => {
                voice.failed = Some(message.clone());
            }
        }
    }

    /// Total seconds expected across all voices
    pub fn expected_seconds(&self) -> f64 {
        self.voices.values().map(|v| v.expected_seconds).sum()
    }

    /// Total seconds rendered across all voices
    pub fn rendered_seconds(&self) -> f64 {
        self.voices.values().map(|v| v.rendered_seconds).sum()
    }

    /// Completion ratio in [0, 1]
    pub fn fraction_done(&self) -> f64 {
        let expected = self.expected_seconds();
        if expected <= 0.0 {
            return if self.all_settled() { 1.0 } else { 0.0 };
        }
        (self.rendered_seconds() / expected).clamp(0.0, 1.0)
    }

    /// Rendered seconds per wall-clock second since `started`
    pub fn throughput(&self, started: DateTime<Utc>) -> f64 {
        let elapsed = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.rendered_seconds() / elapsed
    }

    /// True once every task has completed or failed
    pub fn all_settled(&self) -> bool {
        self.voices
            .values()
            .all(|v| v.completed || v.failed.is_some())
    }

    /// Voices that failed, with their messages
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.voices
            .iter()
            .filter_map(|(voice, state)| {
                state
                    .failed
                    .as_deref()
                    .map(|message| (voice.as_str(), message))
            })
            .collect()
    }
}
