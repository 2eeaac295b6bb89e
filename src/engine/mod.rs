//! Render pipeline: jobs, concatenation, smart cuts, transitions and export

pub mod concat;
pub mod export;
pub mod progress;
pub mod runner;
pub mod smart_cut;
pub mod transitions;

pub use concat::{ChunkedConcatenator, ConcatPlan};
pub use export::{ExportReport, ExportRequest, Exporter};
pub use progress::{CancelToken, ExportPhase, LoggingProgress, ProgressCallback, ProgressTracker};
pub use runner::{FilterGraph, JobRunner, JobSpec};
pub use smart_cut::SmartCutExecutor;
pub use transitions::TransitionRenderer;
