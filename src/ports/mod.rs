// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;

use crate::domain::model::MediaProbe;
use crate::engine::progress::CancelToken;
use crate::error::CutlistResult;

/// Time range of a keyframe probe, in source seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Window of `radius` seconds around `center`, clamped at zero
    pub fn around(center: f64, radius: f64) -> Self {
        Self {
            start: (center - radius).max(0.0),
            end: center + radius,
        }
    }
}

/// How an encoder process ended
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Tail of the process diagnostics
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
        }
    }
}

/// Receives encoded-time updates (seconds of output written)
pub type TimeCallback<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Port for the external media toolkit.
///
/// All operations are fallible and time-bounded. Implementations must stop
/// the underlying process when `cancel` fires.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Read duration and streams of a media file
    async fn probe(&self, path: &Path) -> CutlistResult<MediaProbe>;

    /// Run one encoder invocation with the given arguments
    async fn run(
        &self,
        args: &[String],
        cancel: &CancelToken,
        on_time: TimeCallback<'_>,
    ) -> CutlistResult<ProcessOutcome>;

    /// Keyframe timestamps of the primary video stream inside `window`
    async fn find_keyframes(&self, path: &Path, window: TimeWindow) -> CutlistResult<Vec<f64>>;
}
