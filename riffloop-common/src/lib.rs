//! # riffloop Common Library
//!
//! Shared code for the riffloop splicing engine:
//! - Tick-indexed chart representation and helper queries
//! - Time-base conversion math (ticks, seconds, samples)
//! - Error taxonomy
//! - Render progress event types
//! - Composition parameters

pub mod chart;
pub mod error;
pub mod events;
pub mod params;
pub mod timebase;

pub use chart::{Chart, ChartMeta, SyncEvent, TrackEvent};
pub use error::{Error, Result};
pub use params::ComposeParams;
pub use timebase::Tick;
