//! Artifact Writer
//!
//! Assembles the output song folder: untouched files copied from the
//! source songs, the synthesized chart (written through an external
//! [`ChartWriter`] capability), and a `song.ini` metadata file. Rendered
//! stems land in the same folder, written by the render tasks.
//!
//! When the output folder coincides with one of the input song folders
//! ("in-place" edit), everything is written to a sibling staging folder
//! first and reconciled after all stems succeed, so no render task ever
//! reads a file it is concurrently overwriting.

use crate::plan::Song;
use crate::voice::AUDIO_EXTENSIONS;
use riffloop_common::{Chart, Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive/database extensions never copied from source folders
const EXCLUDED_EXTENSIONS: [&str; 2] = ["dat", "db"];

/// Generated file names; source copies of these are skipped
const GENERATED_FILES: [&str; 3] = ["notes.chart", "notes.mid", "song.ini"];

/// External capability that persists a chart to disk
///
/// The notation file format itself is out of scope here; the engine hands
/// the writer a finished [`Chart`] and a destination path.
pub trait ChartWriter: Send + Sync {
    fn write_chart(&self, chart: &Chart, path: &Path) -> Result<()>;
}

/// Writes the composed song folder, staging when editing in place
pub struct ArtifactWriter {
    output: PathBuf,
    staging: Option<PathBuf>,
}

impl ArtifactWriter {
    /// Plan the write for `output`, staging if it is one of the inputs
    pub fn new(output: PathBuf, songs: &[Song]) -> Self {
        let in_place = songs.iter().any(|song| same_folder(&song.folder, &output));
        let staging = in_place.then(|| {
            let mut name = output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            name.push_str(".staging");
            let staged = output.with_file_name(name);
            info!(
                "output folder is an input; staging into {}",
                staged.display()
            );
            staged
        });
        ArtifactWriter { output, staging }
    }

    /// Folder render tasks and file writes should target
    pub fn render_dir(&self) -> &Path {
        self.staging.as_deref().unwrap_or(&self.output)
    }

    /// Create the target folder
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(self.render_dir())?;
        Ok(())
    }

    /// Copy untouched asset files from every song folder
    ///
    /// The first song's files win conflicts. Audio stems, archives and
    /// the generated chart/metadata files are skipped.
    pub fn copy_sources(&self, songs: &[Song]) -> Result<()> {
        for (index, song) in songs.iter().enumerate() {
            self.copy_folder(&song.folder, self.render_dir(), index == 0)
                .map_err(|e| {
                    Error::Asset(format!(
                        "failed to copy assets of song \"{}\": {}",
                        song.id, e
                    ))
                })?;
        }
        Ok(())
    }

    fn copy_folder(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            let source = entry.path();
            let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let target = to.join(name);
            if entry.file_type()?.is_dir() {
                self.copy_folder(&source, &target, overwrite)?;
                continue;
            }
            if excluded(&source) {
                continue;
            }
            if !overwrite && target.exists() {
                continue;
            }
            debug!("copying {} -> {}", source.display(), target.display());
            std::fs::copy(&source, &target)?;
        }
        Ok(())
    }

    /// Write `song.ini` from the chart metadata
    ///
    /// The `song_length` property is dropped: the composed song's length
    /// differs from any source's.
    pub fn write_metadata(&self, chart: &Chart) -> Result<()> {
        let mut lines = vec!["[song]".to_string()];
        lines.push(format!("name = {}", chart.meta.name));
        lines.push(format!("artist = {}", chart.meta.artist));
        for (key, value) in &chart.meta.extra {
            if key.eq_ignore_ascii_case("song_length") {
                continue;
            }
            lines.push(format!("{} = {}", key, value));
        }
        lines.push(String::new());
        std::fs::write(self.render_dir().join("song.ini"), lines.join("\n"))?;
        Ok(())
    }

    /// Write the synthesized chart through the external capability
    pub fn write_chart(&self, chart: &Chart, writer: &dyn ChartWriter) -> Result<()> {
        writer.write_chart(chart, &self.render_dir().join("notes.chart"))
    }

    /// Reconcile the staging folder into the real output
    ///
    /// No-op unless staging is active. Stale generated files in the
    /// output are replaced by their staged versions; the staging folder
    /// is removed afterwards.
    pub fn finalize(&self) -> Result<()> {
        let Some(staging) = &self.staging else {
            return Ok(());
        };
        reconcile(staging, &self.output)?;
        std::fs::remove_dir_all(staging)?;
        info!("staging reconciled into {}", self.output.display());
        Ok(())
    }

    /// The final output folder
    pub fn output_dir(&self) -> &Path {
        &self.output
    }
}

fn reconcile(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            reconcile(&source, &target)?;
        } else {
            std::fs::copy(&source, &target)?;
        }
    }
    Ok(())
}

fn excluded(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) || EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
        return true;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| GENERATED_FILES.iter().any(|g| name.eq_ignore_ascii_case(g)))
        .unwrap_or(false)
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => {
            warn!(
                "could not canonicalize {} or {}; comparing literally",
                a.display(),
                b.display()
            );
            a == b
        }
    }
}
