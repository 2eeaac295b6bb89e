//! cutlist library
//!
//! Non-destructive edit decision lists over source media, with a smart-cut
//! export pipeline that stream-copies everything it can and re-encodes only
//! the frames around cut points and transitions.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use config::CutlistConfig;
pub use domain::edl::{EdlOptions, EdlStore};
pub use domain::errors::EditError;
pub use domain::model::{Project, Segment, SourceId, TimeSpec, Timeline, TransitionEffect, TransitionKind};
pub use error::{CutlistError, CutlistResult};
