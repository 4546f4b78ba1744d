//! # riffloop Engine
//!
//! The splicing pipeline: takes an ordered list of source songs and a
//! list of tick-range parts, and composes one practice song from them.
//! - Part resolution, tick normalization and quantization
//! - Timeline composer (the spliced chart)
//! - Voice composer (per-stem trim/concat/delay render plans)
//! - Async render driver fanning plans out to a [`render::StemRenderer`]
//! - Artifact writer assembling the output song folder
//! - Plugin registry for plan and chart passes

pub mod plan;
pub mod plugin;
pub mod render;
pub mod splicer;
pub mod timeline;
pub mod voice;
pub mod writer;

pub use plan::{Part, PartSpec, Plan, Song};
pub use render::{RenderDriver, StemRenderer};
pub use splicer::{SpliceOutcome, Splicer};
pub use voice::{RenderPlan, VoiceInventory};
pub use writer::{ArtifactWriter, ChartWriter};
