//! Timeline Composer
//!
//! Walks the ordered part list and merges each part's chart slice into one
//! output tick stream. Composition is an explicit fold: a [`ComposerState`]
//! value (output chart + tick cursor) is threaded through the parts and a
//! new state is returned at each step, so single steps are testable in
//! isolation and there is no hidden mutation.
//!
//! Sync-track handling follows the diff rule: a corrective tempo or
//! time-signature event is inserted at a part boundary only when the value
//! in effect in the output differs from the value in effect at the part's
//! source start. Source sync events sitting exactly on the start boundary
//! are dropped from the slice (the diff rule already covers them); sync
//! events inside the part are carried through unchanged.

use crate::plan::{EventLabel, Part, Song};
use riffloop_common::chart::{Chart, SyncEvent};
use riffloop_common::timebase::Tick;
use riffloop_common::{ComposeParams, Error, Result};
use tracing::debug;

/// Fold state threaded through the part list
#[derive(Debug, Clone)]
pub struct ComposerState {
    /// Output chart built so far
    pub chart: Chart,
    /// Output tick position where the next part lands
    pub cursor: Tick,
}

/// Builds the merged output chart from resolved parts
pub struct TimelineComposer<'a> {
    songs: &'a [Song],
    output_resolution: u32,
    params: &'a ComposeParams,
}

impl<'a> TimelineComposer<'a> {
    pub fn new(songs: &'a [Song], output_resolution: u32, params: &'a ComposeParams) -> Self {
        TimelineComposer {
            songs,
            output_resolution,
            params,
        }
    }

    /// Compose the output chart from the ordered part list
    ///
    /// Parts must be fully resolved (no open ends). The cursor starts at
    /// the silent lead-in, `output_resolution * lead_in_beats` ticks.
    pub fn compose(&self, parts: &[Part]) -> Result<Chart> {
        if parts.is_empty() {
            return Err(Error::Config("no parts to compose".to_string()));
        }

        let state = parts
            .iter()
            .enumerate()
            .try_fold(self.initial_state(&parts[0]), |state, (index, part)| {
                self.place_part(state, index, part)
            })?;

        debug!(
            "Timeline composed: {} ticks at resolution {}",
            state.cursor, self.output_resolution
        );
        Ok(state.chart)
    }

    /// Initial state: first song's metadata, the first part's source tempo
    /// and signature at tick 0, cursor at the lead-in
    fn initial_state(&self, first: &Part) -> ComposerState {
        let source = &self.songs[first.song_index].chart;

        let mut chart = Chart::new(self.output_resolution);
        chart.meta = source.meta.clone();
        chart.meta.resolution = self.output_resolution;
        chart.meta.streams.clear();

        chart.push_sync(
            0,
            SyncEvent::Tempo {
                millibpm: source.tempo_at(first.start),
            },
        );
        chart.push_sync(
            0,
            SyncEvent::TimeSignature {
                numerator: source.signature_at(first.start),
            },
        );

        let cursor = (self.output_resolution as f64 * self.params.lead_in_beats).round() as Tick;
        ComposerState { chart, cursor }
    }

    /// Place one part (all its repeats) and return the advanced state
    pub fn place_part(&self, state: ComposerState, index: usize, part: &Part) -> Result<ComposerState> {
        let song = &self.songs[part.song_index];
        let start = part.start;
        let span = part.span()?;
        let end = start + span;
        if span <= 0 {
            return Err(Error::TimeBase(format!(
                "part {} ({}): empty range {} .. {}",
                index, song.id, start, end
            )));
        }

        let mut slice = song.chart.filter_range(start, end);
        if self.params.clamp_durations {
            slice.clamp_sustains(end);
        }
        // Boundary sync state is handled by the diff rule below.
        slice.sync_track.remove(&start);
        if part.label == EventLabel::SuppressInherited {
            slice.events.remove(&start);
        }

        let source_tempo = song.chart.tempo_at(start);
        let source_signature = song.chart.signature_at(start);

        let ComposerState { mut chart, mut cursor } = state;
        for _ in 0..part.repeat {
            if self.params.insert_sync {
                if chart.tempo_at(cursor) != source_tempo {
                    chart.push_sync(cursor, SyncEvent::Tempo { millibpm: source_tempo });
                }
                if chart.signature_at(cursor) != source_signature {
                    chart.push_sync(
                        cursor,
                        SyncEvent::TimeSignature {
                            numerator: source_signature,
                        },
                    );
                }
            }
            if let EventLabel::Marker(name) = &part.label {
                chart.push_text(cursor, format!("section {}", name));
            }
            chart.merge(slice.shifted(cursor - start));
            cursor += span;
        }

        Ok(ComposerState { chart, cursor })
    }
}
