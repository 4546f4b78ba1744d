//! Voice Composer
//!
//! Discovers the audio stems of every source song, then walks the same
//! ordered part list as the timeline composer and builds one
//! [`RenderPlan`] per voice: an ordered sequence of source-audio and
//! generated-silence regions whose boundaries mirror the chart part
//! boundaries, converted to seconds through each song's own tempo map.
//!
//! The union of stem names across all songs defines the output voices. A
//! song lacking a given stem contributes silence of the part's span
//! instead of audio, so every voice stays frame-aligned with the chart.
//!
//! Trimming past a stem's probed frame count is tolerated with a warning:
//! chart and raw audio lengths commonly disagree by authoring slop, and
//! the overrun amount is reported instead of failing the run.

use crate::plan::{Part, Song};
use riffloop_common::timebase::{
    lead_in_delay_ms, ms_to_seconds, samples_to_seconds, seconds_to_samples,
};
use riffloop_common::{ComposeParams, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stem file extensions considered audio
pub const AUDIO_EXTENSIONS: [&str; 3] = ["ogg", "mp3", "wav"];

/// Reserved stem name excluded from voice discovery
pub const PREVIEW_STEM: &str = "preview";

/// A discovered stem file with its probed metadata
#[derive(Debug, Clone)]
pub struct StemFile {
    /// Full path to the audio file
    pub path: PathBuf,
    /// Sample rate reported by the container
    pub sample_rate: u32,
    /// Total frame count, when the container reports one
    pub frames: Option<u64>,
}

impl StemFile {
    /// Stem duration in seconds, when the frame count is known
    pub fn duration_seconds(&self) -> Option<f64> {
        self.frames
            .map(|frames| samples_to_seconds(frames as i64, self.sample_rate))
    }
}

/// Probe a stem file's sample rate and frame count
///
/// Unreadable metadata is fatal, reported with the path.
pub fn probe_stem(path: &Path) -> Result<StemFile> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Asset(format!("failed to open stem {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Asset(format!("failed to probe stem {}: {}", path.display(), e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Asset(format!("no audio track in {}", path.display())))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Asset(format!("no sample rate in {}", path.display())))?;

    Ok(StemFile {
        path: path.to_path_buf(),
        sample_rate,
        frames: track.codec_params.n_frames,
    })
}

/// Enumerate a song folder's stems: audio files keyed by file stem,
/// excluding the reserved preview file
pub fn scan_stems(folder: &Path) -> Result<BTreeMap<String, StemFile>> {
    let mut stems = BTreeMap::new();
    let entries = std::fs::read_dir(folder)
        .map_err(|e| Error::Asset(format!("failed to read song folder {}: {}", folder.display(), e)))?;

    for entry in entries {
        let path = entry?.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if name.eq_ignore_ascii_case(PREVIEW_STEM) {
            continue;
        }
        stems.insert(name.to_ascii_lowercase(), probe_stem(&path)?);
    }
    Ok(stems)
}

/// The discovered stems of every song in the plan
#[derive(Debug, Clone, Default)]
pub struct VoiceInventory {
    /// Per-song stem maps, indexed like the plan's song list
    pub songs: Vec<BTreeMap<String, StemFile>>,
}

impl VoiceInventory {
    /// Scan every song folder
    pub fn scan(songs: &[Song]) -> Result<Self> {
        let mut inventory = VoiceInventory::default();
        for song in songs {
            let stems = scan_stems(&song.folder)?;
            debug!(
                "song \"{}\": {} stems ({})",
                song.id,
                stems.len(),
                stems.keys().cloned().collect::<Vec<_>>().join(", ")
            );
            inventory.songs.push(stems);
        }
        Ok(inventory)
    }

    /// Union of stem names across all songs; defines the output voices
    pub fn voice_names(&self) -> BTreeSet<String> {
        self.songs
            .iter()
            .flat_map(|stems| stems.keys().cloned())
            .collect()
    }

    /// Longest stem duration of a song, in seconds
    ///
    /// Used to resolve open-ended parts against the actual audio length.
    pub fn audio_end_seconds(&self, song_index: usize) -> Option<f64> {
        self.songs
            .get(song_index)?
            .values()
            .filter_map(|stem| stem.duration_seconds())
            .fold(None, |acc, seconds| {
                Some(acc.map_or(seconds, |max: f64| max.max(seconds)))
            })
    }
}

/// One region of a voice's output audio
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Trimmed span of a source stem
    Audio {
        song_index: usize,
        path: PathBuf,
        start_seconds: f64,
        end_seconds: f64,
        sample_rate: u32,
    },
    /// Generated silence
    Silence { seconds: f64, sample_rate: u32 },
}

impl Region {
    /// Region duration in seconds
    pub fn seconds(&self) -> f64 {
        match self {
            Region::Audio {
                start_seconds,
                end_seconds,
                ..
            } => end_seconds - start_seconds,
            Region::Silence { seconds, .. } => *seconds,
        }
    }
}

/// Ordered trim/silence/concat/delay operations producing one output stem
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Voice name ("song", "guitar", ...)
    pub voice: String,
    /// Output file path
    pub output: PathBuf,
    /// Ordered regions
    pub regions: Vec<Region>,
    /// Output sample rate (first real input's rate, or the nominal rate)
    pub sample_rate: u32,
    /// Lead-in silence prepended to the output, seconds
    pub delay_seconds: f64,
    /// Lead-in in output samples, including the sub-sample offset
    pub delay_samples: i64,
}

impl RenderPlan {
    /// Sum of region durations, used for open-end resolution and progress
    pub fn expected_seconds(&self) -> f64 {
        self.regions.iter().map(Region::seconds).sum()
    }

    /// Unique input paths in first-use order
    pub fn inputs(&self) -> Vec<PathBuf> {
        let mut inputs = Vec::new();
        for region in &self.regions {
            if let Region::Audio { path, .. } = region {
                if !inputs.contains(path) {
                    inputs.push(path.clone());
                }
            }
        }
        inputs
    }

    /// Render the plan as an ffmpeg-style filter-graph description
    ///
    /// Used both by renderers that drive an external encoder and by error
    /// reports when a render task fails.
    pub fn filter_graph(&self) -> String {
        let inputs = self.inputs();
        let mut filters = Vec::new();
        let mut labels = Vec::new();

        for (index, region) in self.regions.iter().enumerate() {
            let label = format!("part{}", index);
            match region {
                Region::Audio {
                    path,
                    start_seconds,
                    end_seconds,
                    sample_rate,
                    ..
                } => {
                    let input = inputs.iter().position(|p| p == path).unwrap_or(0);
                    let start_pts = seconds_to_samples(*start_seconds, *sample_rate);
                    // The boundary sample belongs to the next trim of the
                    // same source, not to this one.
                    let end_pts = seconds_to_samples(*end_seconds, *sample_rate) - 1;
                    filters.push(format!(
                        "[{}:0]atrim=start_pts={}:end_pts={},asetpts=PTS-STARTPTS[{}]",
                        input, start_pts, end_pts, label
                    ));
                }
                Region::Silence { seconds, sample_rate } => {
                    let end_pts = seconds_to_samples(*seconds, *sample_rate);
                    filters.push(format!(
                        "anullsrc=r={},atrim=start_pts=0:end_pts={}[{}]",
                        sample_rate, end_pts, label
                    ));
                }
            }
            labels.push(format!("[{}]", label));
        }

        let concat_output = if self.delay_samples > 0 { "merged" } else { "output" };
        filters.push(format!(
            "{}concat=n={}:v=0:a=1[{}]",
            labels.join(""),
            labels.len(),
            concat_output
        ));
        if self.delay_samples > 0 {
            filters.push(format!(
                "[merged]adelay=delays={}S:all=1[output]",
                self.delay_samples
            ));
        }
        filters.join(";")
    }
}

/// Builds per-voice render plans from the shared part list
pub struct VoiceComposer<'a> {
    songs: &'a [Song],
    inventory: &'a VoiceInventory,
    params: &'a ComposeParams,
}

impl<'a> VoiceComposer<'a> {
    pub fn new(songs: &'a [Song], inventory: &'a VoiceInventory, params: &'a ComposeParams) -> Self {
        VoiceComposer {
            songs,
            inventory,
            params,
        }
    }

    /// Build one render plan per discovered voice
    ///
    /// Walks the same ordered part list as the timeline composer; region
    /// boundaries are the part boundaries converted to seconds through
    /// each part's song's own tempo map, nudged by the part offsets and
    /// stretched by the drift correction when configured.
    pub fn compose(&self, parts: &[Part], output_dir: &Path) -> Result<BTreeMap<String, RenderPlan>> {
        if parts.is_empty() {
            return Err(Error::Config("no parts to compose".to_string()));
        }
        if self.params.ignore_audio {
            return Ok(BTreeMap::new());
        }

        // Part boundaries in seconds, shared by every voice of a song.
        let spans: Vec<(f64, f64)> = parts
            .iter()
            .enumerate()
            .map(|(index, part)| self.part_span_seconds(index, part))
            .collect::<Result<_>>()?;

        let first = &parts[0];
        let first_tempo = self.songs[first.song_index].chart.tempo_at(first.start);

        let mut plans = BTreeMap::new();
        for voice in self.inventory.voice_names() {
            let plan = self.compose_voice(&voice, parts, &spans, first_tempo, output_dir)?;
            debug!(
                "voice \"{}\": {} regions, {:.3}s expected",
                voice,
                plan.regions.len(),
                plan.expected_seconds()
            );
            plans.insert(voice, plan);
        }
        Ok(plans)
    }

    /// A part's `[start, end)` in seconds of its source song, with offsets
    /// and drift correction applied
    fn part_span_seconds(&self, index: usize, part: &Part) -> Result<(f64, f64)> {
        let song = &self.songs[part.song_index];
        let chart = &song.chart;
        let start = chart.position_to_seconds(part.start) + ms_to_seconds(part.start_offset_ms);
        let mut end = chart.position_to_seconds(part.end_tick()?) + ms_to_seconds(part.end_offset_ms);
        if self.params.drift_factor > 0.0 {
            end += (end - start) / self.params.drift_factor;
        }
        if end <= start {
            return Err(Error::TimeBase(format!(
                "part {} ({}): range collapsed after offsets ({:.4}s .. {:.4}s)",
                index, song.id, start, end
            )));
        }
        Ok((start, end))
    }

    fn compose_voice(
        &self,
        voice: &str,
        parts: &[Part],
        spans: &[(f64, f64)],
        first_tempo: u32,
        output_dir: &Path,
    ) -> Result<RenderPlan> {
        let mut regions = Vec::new();

        for (part, &(start_seconds, end_seconds)) in parts.iter().zip(spans) {
            let region = match self.inventory.songs[part.song_index].get(voice) {
                Some(stem) => {
                    if let Some(duration) = stem.duration_seconds() {
                        if end_seconds > duration {
                            warn!(
                                "voice \"{}\": trim end {:.3}s exceeds {} ({:.3}s) by {:.3}s",
                                voice,
                                end_seconds,
                                stem.path.display(),
                                duration,
                                end_seconds - duration
                            );
                        }
                    }
                    Region::Audio {
                        song_index: part.song_index,
                        path: stem.path.clone(),
                        start_seconds,
                        end_seconds,
                        sample_rate: stem.sample_rate,
                    }
                }
                None => Region::Silence {
                    seconds: end_seconds - start_seconds,
                    sample_rate: self.params.nominal_sample_rate,
                },
            };
            for _ in 0..part.repeat {
                regions.push(region.clone());
            }
        }

        let sample_rate = regions
            .iter()
            .find_map(|region| match region {
                Region::Audio { sample_rate, .. } => Some(*sample_rate),
                Region::Silence { .. } => None,
            })
            .unwrap_or(self.params.nominal_sample_rate);

        let (delay_seconds, delay_samples) = self.lead_in_delay(first_tempo, sample_rate);

        Ok(RenderPlan {
            voice: voice.to_string(),
            output: output_dir.join(format!("{}.ogg", voice)),
            regions,
            sample_rate,
            delay_seconds,
            delay_samples,
        })
    }

    /// Lead-in delay of the configured beat count at the first part's
    /// tempo, plus the sub-sample offset
    fn lead_in_delay(&self, first_tempo: u32, sample_rate: u32) -> (f64, i64) {
        if self.params.lead_in_beats <= 0.0 {
            return (0.0, 0);
        }
        let delay_ms = lead_in_delay_ms(self.params.lead_in_beats, first_tempo);
        let delay_seconds = ms_to_seconds(delay_ms);
        let delay_samples = ((sample_rate as f64 * delay_seconds
            + self.params.samples_offset as f64
            - 1.0)
            .floor() as i64)
            .max(0);
        (delay_seconds, delay_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{EventLabel, PartEnd};
    use riffloop_common::chart::{Chart, SyncEvent};
    use riffloop_common::timebase::Tick;

    fn song(id: &str, index: usize, millibpm: u32) -> Song {
        let mut chart = Chart::new(192);
        chart.push_sync(0, SyncEvent::Tempo { millibpm });
        Song {
            id: id.to_string(),
            index,
            chart,
            folder: PathBuf::from(format!("/songs/{}", id)),
        }
    }

    fn part(song_index: usize, start: Tick, end: Tick, repeat: u32) -> Part {
        Part {
            song_index,
            start,
            end: PartEnd::At(end),
            repeat,
            quantize: None,
            start_offset_ms: 0.0,
            end_offset_ms: 0.0,
            label: EventLabel::None,
        }
    }

    fn stem(path: &str, sample_rate: u32, frames: u64) -> StemFile {
        StemFile {
            path: PathBuf::from(path),
            sample_rate,
            frames: Some(frames),
        }
    }

    fn inventory_for(stems: Vec<BTreeMap<String, StemFile>>) -> VoiceInventory {
        VoiceInventory { songs: stems }
    }

    fn no_lead_in() -> ComposeParams {
        ComposeParams {
            lead_in_beats: 0.0,
            ..ComposeParams::default()
        }
    }

    #[test]
    fn test_missing_stem_becomes_silence() {
        // Scenario: song "b" has no guitar stem
        let songs = vec![song("a", 0, 120_000), song("b", 1, 120_000)];
        let inventory = inventory_for(vec![
            BTreeMap::from([
                ("song".to_string(), stem("/songs/a/song.ogg", 44100, 44100 * 60)),
                ("guitar".to_string(), stem("/songs/a/guitar.ogg", 44100, 44100 * 60)),
            ]),
            BTreeMap::from([("song".to_string(), stem("/songs/b/song.ogg", 44100, 44100 * 60))]),
        ]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        // 8 beats at 120 BPM = 4 seconds each
        let parts = vec![part(0, 0, 192 * 8, 1), part(1, 0, 192 * 8, 1)];
        let plans = composer.compose(&parts, Path::new("/out")).unwrap();

        let guitar = &plans["guitar"];
        assert_eq!(guitar.regions.len(), 2);
        assert!(matches!(guitar.regions[0], Region::Audio { song_index: 0, .. }));
        match &guitar.regions[1] {
            Region::Silence { seconds, sample_rate } => {
                assert!((seconds - 4.0).abs() < 1e-9);
                assert_eq!(*sample_rate, 44100);
            }
            other => panic!("expected silence, got {:?}", other),
        }
        // the full "song" voice has audio for both parts
        assert_eq!(plans["song"].regions.len(), 2);
        assert!(plans["song"]
            .regions
            .iter()
            .all(|region| matches!(region, Region::Audio { .. })));
    }

    #[test]
    fn test_region_duration_matches_chart_span() {
        // alignment property: region seconds == tick span through the
        // same tempo map
        let songs = vec![song("a", 0, 150_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 48000, 48000 * 600),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        let p = part(0, 192 * 2, 192 * 10, 1);
        let plans = composer.compose(&[p.clone()], Path::new("/out")).unwrap();

        let chart = &songs[0].chart;
        let chart_span =
            chart.position_to_seconds(192 * 10) - chart.position_to_seconds(192 * 2);
        let region_span = plans["song"].regions[0].seconds();
        assert!((chart_span - region_span).abs() < 1e-9);
    }

    #[test]
    fn test_repeats_expand_to_repeated_regions() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        let plans = composer
            .compose(&[part(0, 0, 192 * 4, 3)], Path::new("/out"))
            .unwrap();
        let regions = &plans["song"].regions;
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], regions[1]);
        assert_eq!(regions[1], regions[2]);
        // expected duration is 3 x 2 seconds
        assert!((plans["song"].expected_seconds() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_nudge_trim_points() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        let mut p = part(0, 192 * 2, 192 * 4, 1);
        p.start_offset_ms = -25.0;
        p.end_offset_ms = 10.0;
        let plans = composer.compose(&[p], Path::new("/out")).unwrap();

        match &plans["song"].regions[0] {
            Region::Audio {
                start_seconds,
                end_seconds,
                ..
            } => {
                assert!((start_seconds - 0.975).abs() < 1e-9);
                assert!((end_seconds - 2.010).abs() < 1e-9);
            }
            other => panic!("expected audio, got {:?}", other),
        }
    }

    #[test]
    fn test_drift_factor_stretches_end() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = ComposeParams {
            drift_factor: 100.0,
            ..no_lead_in()
        };
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        // 4 beats = 2 seconds; stretched end = 2 + 2/100
        let plans = composer
            .compose(&[part(0, 0, 192 * 4, 1)], Path::new("/out"))
            .unwrap();
        match &plans["song"].regions[0] {
            Region::Audio { end_seconds, .. } => {
                assert!((end_seconds - 2.02).abs() < 1e-9);
            }
            other => panic!("expected audio, got {:?}", other),
        }
    }

    #[test]
    fn test_trim_past_stem_end_is_tolerated() {
        // 1 second of audio, but the chart part spans 4 seconds; the
        // overrun is authoring slop, warned about and kept as planned
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        let plans = composer
            .compose(&[part(0, 0, 192 * 8, 1)], Path::new("/out"))
            .unwrap();
        match &plans["song"].regions[0] {
            Region::Audio { end_seconds, .. } => {
                assert!((end_seconds - 4.0).abs() < 1e-9);
            }
            other => panic!("expected audio, got {:?}", other),
        }
        assert!((plans["song"].expected_seconds() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_collapsed_offsets_name_part_and_song() {
        let songs = vec![song("shortsong", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/shortsong/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        // 1 beat = 500 ms; the end offset pulls the range inside out
        let mut p = part(0, 0, 192, 1);
        p.end_offset_ms = -600.0;
        let err = composer.compose(&[p], Path::new("/out")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("part 0"), "got: {}", message);
        assert!(message.contains("shortsong"), "got: {}", message);
    }

    #[test]
    fn test_lead_in_delay_formula() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = ComposeParams {
            lead_in_beats: 8.0,
            samples_offset: 5,
            ..ComposeParams::default()
        };
        let composer = VoiceComposer::new(&songs, &inventory, &params);

        let plans = composer
            .compose(&[part(0, 0, 192 * 4, 1)], Path::new("/out"))
            .unwrap();
        let plan = &plans["song"];
        // 8 beats at 120 BPM = 4 seconds
        assert!((plan.delay_seconds - 4.0).abs() < 1e-9);
        // floor(44100 * 4.0 + 5 - 1) = 176404
        assert_eq!(plan.delay_samples, 176_404);
    }

    #[test]
    fn test_no_lead_in_means_no_delay() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100 * 600),
        )])]);
        let params = no_lead_in();
        let composer = VoiceComposer::new(&songs, &inventory, &params);
        let plans = composer
            .compose(&[part(0, 0, 192, 1)], Path::new("/out"))
            .unwrap();
        assert_eq!(plans["song"].delay_samples, 0);
    }

    #[test]
    fn test_ignore_audio_produces_no_plans() {
        let songs = vec![song("a", 0, 120_000)];
        let inventory = inventory_for(vec![BTreeMap::from([(
            "song".to_string(),
            stem("/songs/a/song.ogg", 44100, 44100),
        )])]);
        let params = ComposeParams {
            ignore_audio: true,
            ..no_lead_in()
        };
        let composer = VoiceComposer::new(&songs, &inventory, &params);
        let plans = composer
            .compose(&[part(0, 0, 192, 1)], Path::new("/out"))
            .unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_filter_graph_description() {
        let plan = RenderPlan {
            voice: "song".to_string(),
            output: PathBuf::from("/out/song.ogg"),
            regions: vec![
                Region::Audio {
                    song_index: 0,
                    path: PathBuf::from("/songs/a/song.ogg"),
                    start_seconds: 1.0,
                    end_seconds: 2.0,
                    sample_rate: 44100,
                },
                Region::Silence {
                    seconds: 0.5,
                    sample_rate: 44100,
                },
            ],
            sample_rate: 44100,
            delay_seconds: 1.0,
            delay_samples: 44099,
        };

        let graph = plan.filter_graph();
        // trim keeps [44100, 88199]; sample 88200 opens the next region
        assert!(graph.contains("[0:0]atrim=start_pts=44100:end_pts=88199,asetpts=PTS-STARTPTS[part0]"));
        assert!(graph.contains("anullsrc=r=44100,atrim=start_pts=0:end_pts=22050[part1]"));
        assert!(graph.contains("[part0][part1]concat=n=2:v=0:a=1[merged]"));
        assert!(graph.contains("[merged]adelay=delays=44099S:all=1[output]"));
    }

    #[test]
    fn test_filter_graph_without_delay_skips_adelay() {
        let plan = RenderPlan {
            voice: "song".to_string(),
            output: PathBuf::from("/out/song.ogg"),
            regions: vec![Region::Silence {
                seconds: 1.0,
                sample_rate: 44100,
            }],
            sample_rate: 44100,
            delay_seconds: 0.0,
            delay_samples: 0,
        };
        let graph = plan.filter_graph();
        assert!(graph.contains("concat=n=1:v=0:a=1[output]"));
        assert!(!graph.contains("adelay"));
    }

    #[test]
    fn test_inputs_deduplicated_in_first_use_order() {
        let region = |path: &str| Region::Audio {
            song_index: 0,
            path: PathBuf::from(path),
            start_seconds: 0.0,
            end_seconds: 1.0,
            sample_rate: 44100,
        };
        let plan = RenderPlan {
            voice: "song".to_string(),
            output: PathBuf::from("/out/song.ogg"),
            regions: vec![region("/a.ogg"), region("/b.ogg"), region("/a.ogg")],
            sample_rate: 44100,
            delay_seconds: 0.0,
            delay_samples: 0,
        };
        assert_eq!(
            plan.inputs(),
            vec![PathBuf::from("/a.ogg"), PathBuf::from("/b.ogg")]
        );
    }
}
