//! Tick-indexed chart representation and helper queries
//!
//! A [`Chart`] is the opaque, time-indexed event structure the splicing
//! engine consumes and produces. Parsing and writing the on-disk notation
//! format is out of scope for this workspace; an external reader fills
//! this structure in and an external writer capability persists it.
//!
//! Three event streams share the same tick axis:
//!
//! - the **sync track**: tempo and time-signature changes
//! - **global text events**: free-form markers, including `section <name>`
//! - **note tracks**: one sparse map per instrument/difficulty key
//!
//! All range queries use half-open `[start, end)` intervals.

use crate::timebase::{Tick, DEFAULT_MILLIBPM, DEFAULT_SIGNATURE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tempo or time-signature change event
///
/// Tempo is stored as milli-BPM (120 BPM == 120_000) so sync events compare
/// exactly; the splicing engine's diff rule relies on exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// Tempo change, in milli-BPM
    Tempo { millibpm: u32 },
    /// Time-signature change (numerator over an implied /4)
    TimeSignature { numerator: u32 },
}

/// One event on an instrument track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackEvent {
    /// Playable note with an optional sustain extent in ticks (0 = no
    /// sustain)
    Note { fret: u8, sustain: Tick },
    /// Special phrase (star power etc.) covering `length` ticks
    Special { kind: u8, length: Tick },
    /// Track-local text event
    Text(String),
}

/// Summary chart metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartMeta {
    /// Song title
    pub name: String,
    /// Artist name
    pub artist: String,
    /// Ticks per quarter note
    pub resolution: u32,
    /// Produced audio stream file names, keyed by voice name
    /// ("song", "guitar", ...)
    pub streams: BTreeMap<String, String>,
    /// Remaining song properties, passed through to the .ini writer
    pub extra: BTreeMap<String, String>,
}

/// Sparse tick-indexed event map
pub type EventMap<T> = BTreeMap<Tick, Vec<T>>;

/// A complete chart: metadata plus all event streams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Song metadata
    pub meta: ChartMeta,
    /// Tempo / time-signature changes
    pub sync_track: EventMap<SyncEvent>,
    /// Global text events (sections, practice markers)
    pub events: EventMap<String>,
    /// Note tracks keyed by instrument/difficulty name
    /// (e.g. "ExpertSingle")
    pub tracks: BTreeMap<String, EventMap<TrackEvent>>,
}

impl Chart {
    /// Create an empty chart at a given resolution
    pub fn new(resolution: u32) -> Self {
        Chart {
            meta: ChartMeta {
                resolution,
                ..ChartMeta::default()
            },
            ..Chart::default()
        }
    }

    // ------------------------------------------------------------------
    // Event insertion
    // ------------------------------------------------------------------

    /// Append a sync event at a tick
    pub fn push_sync(&mut self, tick: Tick, event: SyncEvent) {
        self.sync_track.entry(tick).or_default().push(event);
    }

    /// Append a global text event at a tick
    pub fn push_text(&mut self, tick: Tick, text: impl Into<String>) {
        self.events.entry(tick).or_default().push(text.into());
    }

    /// Append a track event at a tick
    pub fn push_track_event(&mut self, track: &str, tick: Tick, event: TrackEvent) {
        self.tracks
            .entry(track.to_string())
            .or_default()
            .entry(tick)
            .or_default()
            .push(event);
    }

    // ------------------------------------------------------------------
    // Tempo map queries
    // ------------------------------------------------------------------

    /// Tempo in effect at `tick`, in milli-BPM
    ///
    /// Uses the last tempo event at or before `tick`; defaults to 120 BPM
    /// when no tempo event precedes it.
    pub fn tempo_at(&self, tick: Tick) -> u32 {
        self.sync_track
            .range(..=tick)
            .rev()
            .flat_map(|(_, events)| events.iter().rev())
            .find_map(|event| match event {
                SyncEvent::Tempo { millibpm } => Some(*millibpm),
                _ => None,
            })
            .unwrap_or(DEFAULT_MILLIBPM)
    }

    /// Tempo in effect at `tick`, in BPM
    pub fn bpm_at(&self, tick: Tick) -> f64 {
        self.tempo_at(tick) as f64 / 1000.0
    }

    /// Time-signature numerator in effect at `tick` (default 4)
    pub fn signature_at(&self, tick: Tick) -> u32 {
        self.sync_track
            .range(..=tick)
            .rev()
            .flat_map(|(_, events)| events.iter().rev())
            .find_map(|event| match event {
                SyncEvent::TimeSignature { numerator } => Some(*numerator),
                _ => None,
            })
            .unwrap_or(DEFAULT_SIGNATURE)
    }

    /// Convert a tick position to wall-clock seconds through the tempo map
    ///
    /// Integrates piecewise-constant tempo segments from tick 0.
    pub fn position_to_seconds(&self, tick: Tick) -> f64 {
        let resolution = self.meta.resolution.max(1) as f64;
        let mut seconds = 0.0;
        let mut cursor: Tick = 0;
        let mut millibpm = DEFAULT_MILLIBPM;

        for (&event_tick, events) in self.sync_track.range(..=tick) {
            if event_tick > cursor {
                let beats = (event_tick - cursor) as f64 / resolution;
                seconds += beats * 60.0 / (millibpm as f64 / 1000.0);
                cursor = event_tick;
            }
            for event in events {
                if let SyncEvent::Tempo { millibpm: value } = event {
                    millibpm = *value;
                }
            }
        }

        if tick > cursor {
            let beats = (tick - cursor) as f64 / resolution;
            seconds += beats * 60.0 / (millibpm as f64 / 1000.0);
        }
        seconds
    }

    /// Convert wall-clock seconds back to the nearest tick position
    ///
    /// Inverse of [`position_to_seconds`](Chart::position_to_seconds),
    /// rounding to the nearest tick inside the final tempo segment.
    pub fn seconds_to_position(&self, seconds: f64) -> Tick {
        let resolution = self.meta.resolution.max(1) as f64;
        let mut segment_start_seconds = 0.0;
        let mut cursor: Tick = 0;
        let mut millibpm = DEFAULT_MILLIBPM;

        for (&event_tick, events) in &self.sync_track {
            let beats = (event_tick - cursor) as f64 / resolution;
            let segment_end_seconds =
                segment_start_seconds + beats * 60.0 / (millibpm as f64 / 1000.0);
            if segment_end_seconds > seconds {
                break;
            }
            segment_start_seconds = segment_end_seconds;
            cursor = event_tick;
            for event in events {
                if let SyncEvent::Tempo { millibpm: value } = event {
                    millibpm = *value;
                }
            }
        }

        let remaining_beats =
            (seconds - segment_start_seconds) * (millibpm as f64 / 1000.0) / 60.0;
        cursor + (remaining_beats * resolution).round() as Tick
    }

    // ------------------------------------------------------------------
    // Structure queries
    // ------------------------------------------------------------------

    /// Tick position of a named section, if present
    ///
    /// Sections are global text events of the form `section <name>`.
    pub fn find_section_position(&self, name: &str) -> Option<Tick> {
        let wanted = format!("section {}", name);
        self.events
            .iter()
            .find(|(_, texts)| texts.iter().any(|text| text == &wanted))
            .map(|(&tick, _)| tick)
    }

    /// Tick of the first note on any track
    pub fn first_note_position(&self) -> Option<Tick> {
        self.tracks
            .values()
            .filter_map(|track| {
                track
                    .iter()
                    .find(|(_, events)| {
                        events
                            .iter()
                            .any(|event| matches!(event, TrackEvent::Note { .. }))
                    })
                    .map(|(&tick, _)| tick)
            })
            .min()
    }

    /// Tick of the last note on any track (sustain extent not included)
    pub fn last_note_position(&self) -> Option<Tick> {
        self.tracks
            .values()
            .filter_map(|track| {
                track
                    .iter()
                    .rev()
                    .find(|(_, events)| {
                        events
                            .iter()
                            .any(|event| matches!(event, TrackEvent::Note { .. }))
                    })
                    .map(|(&tick, _)| tick)
            })
            .max()
    }

    // ------------------------------------------------------------------
    // Slicing and merging
    // ------------------------------------------------------------------

    /// Extract the sub-chart covering `[start, end)`
    ///
    /// All event streams are filtered; metadata is carried over unchanged.
    pub fn filter_range(&self, start: Tick, end: Tick) -> Chart {
        fn filter<T: Clone>(map: &EventMap<T>, start: Tick, end: Tick) -> EventMap<T> {
            map.range(start..end)
                .map(|(&tick, events)| (tick, events.clone()))
                .collect()
        }

        Chart {
            meta: self.meta.clone(),
            sync_track: filter(&self.sync_track, start, end),
            events: filter(&self.events, start, end),
            tracks: self
                .tracks
                .iter()
                .map(|(name, track)| (name.clone(), filter(track, start, end)))
                .collect(),
        }
    }

    /// Return a copy with every position shifted by `offset`
    ///
    /// Sustain and phrase extents are durations and do not shift.
    pub fn shifted(&self, offset: Tick) -> Chart {
        fn shift<T: Clone>(map: &EventMap<T>, offset: Tick) -> EventMap<T> {
            map.iter()
                .map(|(&tick, events)| (tick + offset, events.clone()))
                .collect()
        }

        Chart {
            meta: self.meta.clone(),
            sync_track: shift(&self.sync_track, offset),
            events: shift(&self.events, offset),
            tracks: self
                .tracks
                .iter()
                .map(|(name, track)| (name.clone(), shift(track, offset)))
                .collect(),
        }
    }

    /// Merge another chart's events into this one (append-only union)
    pub fn merge(&mut self, other: Chart) {
        for (tick, events) in other.sync_track {
            self.sync_track.entry(tick).or_default().extend(events);
        }
        for (tick, texts) in other.events {
            self.events.entry(tick).or_default().extend(texts);
        }
        for (name, track) in other.tracks {
            let target = self.tracks.entry(name).or_default();
            for (tick, events) in track {
                target.entry(tick).or_default().extend(events);
            }
        }
    }

    /// Clip every note/phrase extent so nothing reaches past `end`
    pub fn clamp_sustains(&mut self, end: Tick) {
        for track in self.tracks.values_mut() {
            for (&tick, events) in track.iter_mut() {
                for event in events.iter_mut() {
                    match event {
                        TrackEvent::Note { sustain, .. } if tick + *sustain > end => {
                            *sustain = (end - tick).max(0);
                        }
                        TrackEvent::Special { length, .. } if tick + *length > end => {
                            *length = (end - tick).max(0);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Rescale the whole chart to a new resolution, rounding each position
    /// and extent to the nearest tick
    ///
    /// Non-integral ratios (e.g. 192 -> 440) round each value
    /// independently; the resulting sub-tick drift is a documented,
    /// accepted limitation of resolution normalization, not an error.
    pub fn convert_resolution(&mut self, target: u32) {
        let from = self.meta.resolution;
        if from == target {
            return;
        }
        tracing::debug!("Rescaling chart resolution {} -> {}", from, target);
        let rescale = |tick: Tick| crate::timebase::rescale_tick(tick, from, target);

        fn remap<T>(map: EventMap<T>, rescale: &dyn Fn(Tick) -> Tick) -> EventMap<T> {
            let mut out: EventMap<T> = BTreeMap::new();
            for (tick, events) in map {
                out.entry(rescale(tick)).or_default().extend(events);
            }
            out
        }

        self.sync_track = remap(std::mem::take(&mut self.sync_track), &rescale);
        self.events = remap(std::mem::take(&mut self.events), &rescale);
        self.tracks = std::mem::take(&mut self.tracks)
            .into_iter()
            .map(|(name, track)| {
                let mut track = remap(track, &rescale);
                for events in track.values_mut() {
                    for event in events.iter_mut() {
                        match event {
                            TrackEvent::Note { sustain, .. } => *sustain = rescale(*sustain),
                            TrackEvent::Special { length, .. } => *length = rescale(*length),
                            TrackEvent::Text(_) => {}
                        }
                    }
                }
                (name, track)
            })
            .collect();
        self.meta.resolution = target;
    }
}
