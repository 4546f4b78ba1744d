//! Render Driver
//!
//! Executes render plans against an external rendering capability, one
//! concurrent task per stem. Each task owns its plan and its output file;
//! the only shared channel is the typed progress stream the driver fans in.
//!
//! A task failure does not cancel sibling tasks and does not roll back
//! already-written sibling outputs, but once every task has settled a
//! single failure fails the overall run, reported with the stem name and
//! the filter-graph description that was attempted.

use crate::voice::RenderPlan;
use chrono::Utc;
use riffloop_common::events::{ProgressReport, RenderEvent, RenderEventKind};
use riffloop_common::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// External render capability: produce one output stem from a plan
///
/// Implementations typically drive an encoder subprocess from the plan's
/// filter-graph description. `render` runs on a blocking worker; progress
/// events go through `progress` with `blocking_send`.
pub trait StemRenderer: Send + Sync + 'static {
    fn render(&self, plan: &RenderPlan, progress: &mpsc::Sender<RenderEvent>) -> Result<()>;
}

/// Fans render plans out to one task per voice and aggregates progress
pub struct RenderDriver<R: StemRenderer> {
    renderer: Arc<R>,
}

impl<R: StemRenderer> RenderDriver<R> {
    pub fn new(renderer: Arc<R>) -> Self {
        RenderDriver { renderer }
    }

    /// Render every plan concurrently and wait for all of them to settle
    ///
    /// Returns the final progress report on success. Any task failure
    /// fails the run after all siblings have settled.
    pub async fn render_all(&self, plans: BTreeMap<String, RenderPlan>) -> Result<ProgressReport> {
        if plans.is_empty() {
            debug!("no render plans, skipping render stage");
            return Ok(ProgressReport::default());
        }

        let started = Utc::now();
        let mut report = ProgressReport::new(
            plans
                .iter()
                .map(|(voice, plan)| (voice.clone(), plan.expected_seconds())),
        );
        let graphs: BTreeMap<String, String> = plans
            .iter()
            .map(|(voice, plan)| (voice.clone(), plan.filter_graph()))
            .collect();

        let (sender, mut receiver) = mpsc::channel::<RenderEvent>(64);
        let mut handles = Vec::new();

        for (voice, plan) in plans {
            let renderer = Arc::clone(&self.renderer);
            let sender = sender.clone();
            info!(
                "rendering voice \"{}\" ({} regions, {:.1}s) -> {}",
                voice,
                plan.regions.len(),
                plan.expected_seconds(),
                plan.output.display()
            );
            handles.push(tokio::task::spawn_blocking(move || {
                let _ = sender.blocking_send(RenderEvent::now(&plan.voice, RenderEventKind::Started));
                match renderer.render(&plan, &sender) {
                    Ok(()) => {
                        let _ = sender
                            .blocking_send(RenderEvent::now(&plan.voice, RenderEventKind::Completed));
                    }
                    Err(e) => {
                        let _ = sender.blocking_send(RenderEvent::now(
                            &plan.voice,
                            RenderEventKind::Failed {
                                message: e.to_string(),
                            },
                        ));
                    }
                }
            }));
        }
        // Workers hold the remaining senders; the channel closes once the
        // last task settles.
        drop(sender);

        while let Some(event) = receiver.recv().await {
            report.apply(&event);
            match &event.kind {
                RenderEventKind::Completed => {
                    info!(
                        "voice \"{}\" done ({:.0}%, {:.1}x realtime)",
                        event.voice,
                        report.fraction_done() * 100.0,
                        report.throughput(started)
                    );
                }
                RenderEventKind::Failed { message } => {
                    error!("voice \"{}\" failed: {}", event.voice, message);
                }
                _ => {}
            }
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Render(format!("render task panicked: {}", e)))?;
        }

        let failures = report.failures();
        if !failures.is_empty() {
            let detail = failures
                .iter()
                .map(|(voice, message)| {
                    format!(
                        "stem \"{}\": {} (filter graph: {})",
                        voice,
                        message,
                        graphs.get(*voice).map(String::as_str).unwrap_or("?")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Render(detail));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::Region;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test renderer: fails voices listed in `fail`, counts completions
    struct MockRenderer {
        fail: Vec<String>,
        rendered: AtomicUsize,
    }

    impl MockRenderer {
        fn new(fail: &[&str]) -> Self {
            MockRenderer {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                rendered: AtomicUsize::new(0),
            }
        }
    }

    impl StemRenderer for MockRenderer {
        fn render(&self, plan: &RenderPlan, progress: &mpsc::Sender<RenderEvent>) -> Result<()> {
            let total = plan.expected_seconds();
            let _ = progress.blocking_send(RenderEvent::now(
                &plan.voice,
                RenderEventKind::Progress {
                    rendered_seconds: total / 2.0,
                },
            ));
            if self.fail.contains(&plan.voice) {
                return Err(Error::Render("encoder exited with status 1".to_string()));
            }
            self.rendered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn plan(voice: &str, seconds: f64) -> RenderPlan {
        RenderPlan {
            voice: voice.to_string(),
            output: PathBuf::from(format!("/out/{}.ogg", voice)),
            regions: vec![Region::Silence {
                seconds,
                sample_rate: 44100,
            }],
            sample_rate: 44100,
            delay_seconds: 0.0,
            delay_samples: 0,
        }
    }

    fn plans(names: &[&str]) -> BTreeMap<String, RenderPlan> {
        names
            .iter()
            .map(|name| (name.to_string(), plan(name, 4.0)))
            .collect()
    }

    #[tokio::test]
    async fn test_all_voices_render() {
        let renderer = Arc::new(MockRenderer::new(&[]));
        let driver = RenderDriver::new(Arc::clone(&renderer));

        let report = driver
            .render_all(plans(&["song", "guitar", "bass"]))
            .await
            .unwrap();

        assert!(report.all_settled());
        assert_eq!(report.rendered_seconds(), 12.0);
        assert_eq!(renderer.rendered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_names_stem_and_graph() {
        let renderer = Arc::new(MockRenderer::new(&["guitar"]));
        let driver = RenderDriver::new(Arc::clone(&renderer));

        let err = driver
            .render_all(plans(&["song", "guitar"]))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("guitar"), "got: {}", message);
        assert!(message.contains("anullsrc"), "got: {}", message);
        assert!(message.contains("encoder exited"), "got: {}", message);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let renderer = Arc::new(MockRenderer::new(&["bass"]));
        let driver = RenderDriver::new(Arc::clone(&renderer));

        let result = driver.render_all(plans(&["song", "guitar", "bass"])).await;
        assert!(result.is_err());
        // both healthy siblings still rendered
        assert_eq!(renderer.rendered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_plan_set_is_a_no_op() {
        let renderer = Arc::new(MockRenderer::new(&[]));
        let driver = RenderDriver::new(renderer);
        let report = driver.render_all(BTreeMap::new()).await.unwrap();
        assert!(report.voices.is_empty());
    }
}
