//! Plugin hooks
//!
//! Two capability interfaces instead of name-keyed dynamic dispatch: a
//! pre-pass that may rewrite the plan before part resolution, and a
//! post-pass invoked once per composed chart (used by difficulty
//! translation and similar track rewriters). The registry is built at
//! startup and runs passes in declared order; any pass can fail fatally.

use crate::plan::Plan;
use riffloop_common::{Chart, Result};
use tracing::info;

/// Pre-pass: rewrite the plan before parts are resolved
pub trait PreparesPlan: Send + Sync {
    /// Plugin name, for logs and error context
    fn name(&self) -> &str;
    fn prepare(&self, plan: &mut Plan) -> Result<()>;
}

/// Post-pass: add or alter note tracks after timeline composition
pub trait PostProcessesChart: Send + Sync {
    fn name(&self) -> &str;
    fn post_process(&self, chart: &mut Chart) -> Result<()>;
}

/// Explicit plugin registry, built at startup
#[derive(Default)]
pub struct PluginRegistry {
    plan_passes: Vec<Box<dyn PreparesPlan>>,
    chart_passes: Vec<Box<dyn PostProcessesChart>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register_plan_pass(&mut self, pass: Box<dyn PreparesPlan>) {
        self.plan_passes.push(pass);
    }

    pub fn register_chart_pass(&mut self, pass: Box<dyn PostProcessesChart>) {
        self.chart_passes.push(pass);
    }

    /// Run every plan pass in declared order
    pub fn run_plan_passes(&self, plan: &mut Plan) -> Result<()> {
        for pass in &self.plan_passes {
            info!("Applying plugin plan pass \"{}\"", pass.name());
            pass.prepare(plan)?;
        }
        Ok(())
    }

    /// Run every chart pass in declared order
    pub fn run_chart_passes(&self, chart: &mut Chart) -> Result<()> {
        for pass in &self.chart_passes {
            info!("Applying plugin chart pass \"{}\"", pass.name());
            pass.post_process(chart)?;
        }
        Ok(())
    }
}
