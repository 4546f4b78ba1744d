//! Composition plan model
//!
//! The external resolver hands the engine an ordered list of [`Song`]s and
//! raw [`PartSpec`]s plus the shared [`ComposeParams`]. This module turns
//! the raw specs into fully resolved [`Part`]s:
//!
//! 1. song references and symbolic section names are resolved (fatal when
//!    absent, naming the song and the token)
//! 2. tick spaces are normalized to one shared output resolution
//! 3. measure quantization is applied, once
//! 4. open-ended parts get their end resolved from the source audio
//!    duration (falling back to the chart's last note)
//!
//! After these passes both composers see the same boundaries in the same
//! tick unit; nothing downstream re-interprets a part.

use riffloop_common::chart::Chart;
use riffloop_common::timebase::{quantize_floor, rescale_tick, Tick};
use riffloop_common::{ComposeParams, Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// A resolved handle to a source song
///
/// Immutable for the rest of the run once resolution normalization has
/// happened.
#[derive(Debug, Clone)]
pub struct Song {
    /// Unique id within the composition
    pub id: String,
    /// Position in the plan's song list
    pub index: usize,
    /// The song's chart timeline
    pub chart: Chart,
    /// Folder containing the song's stems and other assets
    pub folder: PathBuf,
}

/// A chart position given either absolutely or by section name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TickPosition {
    Absolute(Tick),
    Named(String),
}

/// End boundary of a part spec
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PartEndSpec {
    /// Explicit position
    Position(TickPosition),
    /// Until the song's audio/chart data ends
    Open,
}

/// Splice-point label behavior
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLabel {
    /// No marker at this splice point
    #[default]
    None,
    /// Insert a named section marker at the splice point
    Marker(String),
    /// Insert nothing, and suppress source text events inherited at the
    /// part's start boundary
    SuppressInherited,
}

/// One raw splice instruction, as produced by the external resolver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartSpec {
    /// Source song id; defaults to the first song
    pub song: Option<String>,
    /// Start position; defaults to the song's first notated tick
    pub start: Option<TickPosition>,
    /// End position; defaults to open-ended
    pub end: Option<PartEndSpec>,
    /// Number of consecutive repetitions (>= 1)
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Measure-grouping quantization override
    pub quantize: Option<u32>,
    /// Audio trim nudge at the start boundary, milliseconds
    pub start_offset_ms: f64,
    /// Audio trim nudge at the end boundary, milliseconds
    pub end_offset_ms: f64,
    /// Splice-point label
    pub label: EventLabel,
}

fn default_repeat() -> u32 {
    1
}

impl PartSpec {
    /// Spec covering a whole song with defaults everywhere
    pub fn whole_song() -> Self {
        PartSpec {
            repeat: 1,
            ..PartSpec::default()
        }
    }

    /// Spec for an absolute tick range of the default song
    pub fn range(start: Tick, end: Tick) -> Self {
        PartSpec {
            start: Some(TickPosition::Absolute(start)),
            end: Some(PartEndSpec::Position(TickPosition::Absolute(end))),
            repeat: 1,
            ..PartSpec::default()
        }
    }
}

/// Resolved end boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartEnd {
    At(Tick),
    /// Still awaiting resolution from the audio duration
    Open,
}

/// A fully resolved splice instruction
#[derive(Debug, Clone)]
pub struct Part {
    /// Index into the plan's song list
    pub song_index: usize,
    /// Start tick (in the song's tick space; shared space after
    /// normalization)
    pub start: Tick,
    /// End boundary
    pub end: PartEnd,
    /// Repetition count (>= 1)
    pub repeat: u32,
    /// Measure-grouping quantization (already merged with the default)
    pub quantize: Option<u32>,
    /// Audio start nudge, milliseconds
    pub start_offset_ms: f64,
    /// Audio end nudge, milliseconds
    pub end_offset_ms: f64,
    /// Splice-point label
    pub label: EventLabel,
}

impl Part {
    /// The resolved end tick
    ///
    /// Open ends must have been resolved before either composer runs.
    pub fn end_tick(&self) -> Result<Tick> {
        match self.end {
            PartEnd::At(tick) => Ok(tick),
            PartEnd::Open => Err(Error::Internal(
                "part end still open at composition time".to_string(),
            )),
        }
    }

    /// Part length in ticks
    pub fn span(&self) -> Result<Tick> {
        Ok(self.end_tick()? - self.start)
    }
}

/// The resolved composition plan
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Ordered source songs
    pub songs: Vec<Song>,
    /// Ordered raw part specs
    pub parts: Vec<PartSpec>,
    /// Shared composition parameters
    pub params: ComposeParams,
}

/// Resolve raw part specs against the song list
///
/// Symbolic section names are looked up in the owning song's chart; an
/// unknown song id or section name is a fatal configuration error naming
/// the offender.
pub fn resolve_parts(songs: &[Song], specs: &[PartSpec], params: &ComposeParams) -> Result<Vec<Part>> {
    if specs.is_empty() {
        return Err(Error::Config("no parts to compose".to_string()));
    }

    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let song = match &spec.song {
                Some(id) => songs
                    .iter()
                    .find(|song| &song.id == id)
                    .ok_or_else(|| Error::NotFound(format!("part {}: could not find song \"{}\"", index, id)))?,
                None => songs
                    .first()
                    .ok_or_else(|| Error::Config("plan contains no songs".to_string()))?,
            };

            let start = match &spec.start {
                None => song.chart.first_note_position().unwrap_or(0),
                Some(TickPosition::Absolute(tick)) => *tick,
                Some(TickPosition::Named(name)) => resolve_section(song, name)?,
            };

            let end = match &spec.end {
                None | Some(PartEndSpec::Open) => PartEnd::Open,
                Some(PartEndSpec::Position(TickPosition::Absolute(tick))) => PartEnd::At(*tick),
                Some(PartEndSpec::Position(TickPosition::Named(name))) => {
                    PartEnd::At(resolve_section(song, name)?)
                }
            };

            if spec.repeat == 0 {
                return Err(Error::Config(format!(
                    "part {} ({}): repeat count must be >= 1",
                    index, song.id
                )));
            }

            if let PartEnd::At(end_tick) = end {
                if end_tick <= start {
                    return Err(Error::TimeBase(format!(
                        "part {} ({}): end {} is not after start {}",
                        index, song.id, end_tick, start
                    )));
                }
            }

            Ok(Part {
                song_index: song.index,
                start,
                end,
                repeat: spec.repeat,
                quantize: spec.quantize.or(params.quantize),
                start_offset_ms: spec.start_offset_ms,
                end_offset_ms: spec.end_offset_ms,
                label: spec.label.clone(),
            })
        })
        .collect()
}

fn resolve_section(song: &Song, name: &str) -> Result<Tick> {
    song.chart
        .find_section_position(name)
        .ok_or_else(|| Error::NotFound(format!("{}: could not find section \"{}\"", song.id, name)))
}

/// Normalize every song to one shared tick unit
///
/// Output resolution is the maximum across all songs. Songs at a lower
/// resolution are rescaled in place, together with the already-resolved
/// parts that reference them. Runs exactly once, before either composer.
pub fn normalize_resolution(songs: &mut [Song], parts: &mut [Part]) -> Result<u32> {
    let output_resolution = songs
        .iter()
        .map(|song| song.chart.meta.resolution)
        .max()
        .ok_or_else(|| Error::Config("plan contains no songs".to_string()))?;

    for song in songs.iter_mut() {
        let from = song.chart.meta.resolution;
        if from == output_resolution {
            continue;
        }
        debug!(
            "Normalizing song \"{}\" resolution {} -> {}",
            song.id, from, output_resolution
        );
        for part in parts.iter_mut().filter(|part| part.song_index == song.index) {
            part.start = rescale_tick(part.start, from, output_resolution);
            if let PartEnd::At(end) = part.end {
                part.end = PartEnd::At(rescale_tick(end, from, output_resolution));
            }
        }
        song.chart.convert_resolution(output_resolution);
    }

    Ok(output_resolution)
}

/// Floor quantized part boundaries to their measure grid
///
/// A part with quantization `q` snaps both boundaries down to multiples of
/// `resolution * q`. A range that collapses under quantization is fatal.
pub fn quantize_parts(songs: &[Song], parts: &mut [Part], resolution: u32) -> Result<()> {
    for (index, part) in parts.iter_mut().enumerate() {
        let Some(measures) = part.quantize.filter(|&q| q > 0) else {
            continue;
        };
        part.start = quantize_floor(part.start, resolution, measures);
        if let PartEnd::At(end) = part.end {
            let quantized = quantize_floor(end, resolution, measures);
            if quantized <= part.start {
                let song_id = &songs[part.song_index].id;
                return Err(Error::TimeBase(format!(
                    "part {} ({}): range collapsed under quantize {} ({} .. {})",
                    index, song_id, measures, part.start, quantized
                )));
            }
            part.end = PartEnd::At(quantized);
        }
    }
    Ok(())
}

/// Resolve open-ended parts to concrete end ticks
///
/// The end of an open part is the source audio's duration converted back
/// to ticks through the song's own tempo map; songs without probed audio
/// fall back to the chart's last note position.
pub fn resolve_open_ends(
    songs: &[Song],
    parts: &mut [Part],
    audio_end_seconds: impl Fn(usize) -> Option<f64>,
) -> Result<()> {
    for (index, part) in parts.iter_mut().enumerate() {
        if part.end != PartEnd::Open {
            continue;
        }
        let song = &songs[part.song_index];
        let end = match audio_end_seconds(part.song_index) {
            Some(seconds) => song.chart.seconds_to_position(seconds),
            None => song.chart.last_note_position().ok_or_else(|| {
                Error::TimeBase(format!(
                    "part {} ({}): no audio or notes to resolve open end",
                    index, song.id
                ))
            })?,
        };
        if end <= part.start {
            return Err(Error::TimeBase(format!(
                "part {} ({}): resolved open end {} is not after start {}",
                index, song.id, end, part.start
            )));
        }
        debug!("part {} ({}): open end resolved to tick {}", index, song.id, end);
        part.end = PartEnd::At(end);
    }
    Ok(())
}
