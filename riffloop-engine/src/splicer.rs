//! Splicing Engine
//!
//! Top-level orchestrator tying the pipeline together: plugin plan
//! passes, part resolution and normalization, stem discovery, the two
//! composers, the render fan-out and the artifact writer. Callers build
//! a [`Plan`], hand it to [`Splicer::run`] and get back the composed
//! chart, the per-voice render plans and the final progress report.

use crate::plan::{
    normalize_resolution, quantize_parts, resolve_open_ends, resolve_parts, Plan,
};
use crate::plugin::PluginRegistry;
use crate::render::{RenderDriver, StemRenderer};
use crate::timeline::TimelineComposer;
use crate::voice::{RenderPlan, VoiceComposer, VoiceInventory};
use crate::writer::{ArtifactWriter, ChartWriter};
use riffloop_common::events::ProgressReport;
use riffloop_common::{Chart, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Everything a finished splice produced
#[derive(Debug)]
pub struct SpliceOutcome {
    /// The composed chart, as written to the output folder
    pub chart: Chart,
    /// Per-voice render plans, keyed by voice name
    pub plans: BTreeMap<String, RenderPlan>,
    /// Final per-voice progress
    pub report: ProgressReport,
    /// The output folder
    pub output_dir: PathBuf,
}

/// Runs the full splicing pipeline
pub struct Splicer<R: StemRenderer> {
    renderer: Arc<R>,
    chart_writer: Box<dyn ChartWriter>,
    plugins: PluginRegistry,
}

impl<R: StemRenderer> Splicer<R> {
    pub fn new(renderer: Arc<R>, chart_writer: Box<dyn ChartWriter>) -> Self {
        Splicer {
            renderer,
            chart_writer,
            plugins: PluginRegistry::new(),
        }
    }

    /// Registry for plan and chart plugin passes
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Compose `plan` into the `output` song folder
    ///
    /// Stages in the same order both composers expect: plan passes first,
    /// then resolution normalization and quantization (once, so the
    /// timeline and voice composers see identical part boundaries), then
    /// stem discovery, which also settles open-ended parts before either
    /// composer runs.
    pub async fn run(&self, mut plan: Plan, output: PathBuf) -> Result<SpliceOutcome> {
        let started = Instant::now();

        self.plugins.run_plan_passes(&mut plan)?;
        let Plan {
            mut songs,
            parts,
            params,
        } = plan;
        for (index, song) in songs.iter_mut().enumerate() {
            song.index = index;
        }

        let mut parts = resolve_parts(&songs, &parts, &params)?;
        let resolution = normalize_resolution(&mut songs, &mut parts)?;
        quantize_parts(&songs, &mut parts, resolution)?;

        let inventory = if params.ignore_audio {
            VoiceInventory {
                songs: vec![BTreeMap::new(); songs.len()],
            }
        } else {
            VoiceInventory::scan(&songs)?
        };
        resolve_open_ends(&songs, &mut parts, |index| {
            inventory.audio_end_seconds(index)
        })?;

        let mut chart = TimelineComposer::new(&songs, resolution, &params).compose(&parts)?;
        self.plugins.run_chart_passes(&mut chart)?;

        let writer = ArtifactWriter::new(output, &songs);
        writer.prepare()?;
        writer.copy_sources(&songs)?;

        let plans = VoiceComposer::new(&songs, &inventory, &params)
            .compose(&parts, writer.render_dir())?;
        for (voice, render_plan) in &plans {
            if let Some(file) = render_plan.output.file_name() {
                chart
                    .meta
                    .streams
                    .insert(voice.clone(), file.to_string_lossy().into_owned());
            }
        }

        let report = RenderDriver::new(self.renderer.clone())
            .render_all(plans.clone())
            .await?;

        writer.write_metadata(&chart)?;
        writer.write_chart(&chart, self.chart_writer.as_ref())?;
        writer.finalize()?;

        info!(
            "Wrote \"{}\" to {} in {:.2}s",
            chart.meta.name,
            writer.output_dir().display(),
            started.elapsed().as_secs_f64()
        );

        Ok(SpliceOutcome {
            chart,
            plans,
            report,
            output_dir: writer.output_dir().to_path_buf(),
        })
    }
}
