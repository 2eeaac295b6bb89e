//! Progress tracking, phase reporting and cancellation

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Coarse export phases reported to the caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportPhase {
    /// Probing sources and validating the timeline
    Analyzing,
    /// Realizing timeline segments
    Cutting,
    /// Joining parts
    Concatenating,
    /// Re-encoding transition clusters
    Rendering,
    Done,
    Error,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Analyzing => "analyzing",
            ExportPhase::Cutting => "cutting",
            ExportPhase::Concatenating => "concatenating",
            ExportPhase::Rendering => "rendering",
            ExportPhase::Done => "done",
            ExportPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Progress callback trait for UI integration
pub trait ProgressCallback: Send + Sync {
    /// Called on every phase change
    fn on_phase(&self, phase: ExportPhase, message: &str);

    /// Called with a 0-100 percentage for one running job
    fn on_job_progress(&self, job: &str, percent: f64);

    /// Called with a 0-100 percentage for the whole export
    fn on_export_progress(&self, percent: f64);
}

/// Forwards progress to the log
pub struct LoggingProgress;

impl ProgressCallback for LoggingProgress {
    fn on_phase(&self, phase: ExportPhase, message: &str) {
        match phase {
            ExportPhase::Error => error!("[{}] {}", phase, message),
            _ => info!("[{}] {}", phase, message),
        }
    }

    fn on_job_progress(&self, job: &str, percent: f64) {
        debug!("{}: {:.1}%", job, percent);
    }

    fn on_export_progress(&self, percent: f64) {
        info!("Export progress: {:.1}%", percent);
    }
}

/// Cooperative cancellation shared between an export and its jobs
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Aggregates per-job progress into an overall percentage.
///
/// Work is measured in seconds of media. Jobs report partial progress while
/// running and are folded into the completed total when they finish.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<TrackerInner>>,
    callbacks: Arc<Mutex<Vec<Arc<dyn ProgressCallback>>>>,
    cancel: CancelToken,
}

struct TrackerInner {
    phase: ExportPhase,
    total_work: f64,
    completed_work: f64,
    in_flight: HashMap<String, f64>,
    last_update: Option<Instant>,
    update_interval: Duration,
}

impl ProgressTracker {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                phase: ExportPhase::Analyzing,
                total_work: 0.0,
                completed_work: 0.0,
                in_flight: HashMap::new(),
                last_update: None,
                update_interval: Duration::from_millis(250),
            })),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            cancel,
        }
    }

    /// Add a progress callback
    pub fn add_callback(&self, callback: Arc<dyn ProgressCallback>) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn set_update_interval(&self, interval: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.update_interval = interval;
        }
    }

    /// Add expected work, in media seconds
    pub fn add_work(&self, seconds: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.total_work += seconds.max(0.0);
        }
    }

    pub fn set_phase(&self, phase: ExportPhase, message: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = phase;
        }
        self.notify_callbacks(|cb| cb.on_phase(phase, message));
        if phase == ExportPhase::Done {
            self.notify_callbacks(|cb| cb.on_export_progress(100.0));
        }
    }

    pub fn phase(&self) -> Option<ExportPhase> {
        self.inner.lock().ok().map(|inner| inner.phase)
    }

    /// Report seconds processed by a running job of `job_seconds` length
    pub fn job_progress(&self, job: &str, processed: f64, job_seconds: f64) {
        let percent = if job_seconds > 0.0 {
            (processed / job_seconds * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let overall = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            inner
                .in_flight
                .insert(job.to_string(), processed.clamp(0.0, job_seconds.max(0.0)));

            let now = Instant::now();
            let due = inner
                .last_update
                .map_or(true, |last| now.duration_since(last) >= inner.update_interval);
            if !due {
                return;
            }
            inner.last_update = Some(now);
            Self::overall_of(&inner)
        };

        self.notify_callbacks(|cb| cb.on_job_progress(job, percent));
        self.notify_callbacks(|cb| cb.on_export_progress(overall));
    }

    /// Fold a finished job into completed work
    pub fn complete_job(&self, job: &str, job_seconds: f64) {
        let overall = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            inner.in_flight.remove(job);
            inner.completed_work += job_seconds.max(0.0);
            Self::overall_of(&inner)
        };
        self.notify_callbacks(|cb| cb.on_job_progress(job, 100.0));
        self.notify_callbacks(|cb| cb.on_export_progress(overall));
    }

    /// Overall percentage, 0-100
    pub fn overall_percent(&self) -> f64 {
        self.inner
            .lock()
            .map(|inner| Self::overall_of(&inner))
            .unwrap_or(0.0)
    }

    fn overall_of(inner: &TrackerInner) -> f64 {
        if inner.total_work <= 0.0 {
            return 0.0;
        }
        let partial: f64 = inner.in_flight.values().sum();
        ((inner.completed_work + partial) / inner.total_work * 100.0).clamp(0.0, 100.0)
    }

    fn notify_callbacks<F>(&self, f: F)
    where
        F: Fn(&dyn ProgressCallback),
    {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                f(callback.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<ExportPhase>>,
        overall: Mutex<Vec<f64>>,
    }

    impl ProgressCallback for Recorder {
        fn on_phase(&self, phase: ExportPhase, _message: &str) {
            self.phases.lock().unwrap().push(phase);
        }

        fn on_job_progress(&self, _job: &str, _percent: f64) {}

        fn on_export_progress(&self, percent: f64) {
            self.overall.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn test_overall_progress_accumulates_jobs() {
        let tracker = ProgressTracker::new(CancelToken::new());
        tracker.set_update_interval(Duration::ZERO);
        let recorder = Arc::new(Recorder::default());
        tracker.add_callback(recorder.clone());

        tracker.add_work(100.0);
        tracker.job_progress("segment 1", 25.0, 50.0);
        assert_eq!(tracker.overall_percent(), 25.0);

        tracker.complete_job("segment 1", 50.0);
        assert_eq!(tracker.overall_percent(), 50.0);

        tracker.job_progress("segment 2", 500.0, 50.0);
        assert_eq!(tracker.overall_percent(), 100.0);
        assert!(recorder.overall.lock().unwrap().iter().all(|p| *p <= 100.0));
    }

    #[test]
    fn test_phase_changes_are_reported() {
        let tracker = ProgressTracker::new(CancelToken::new());
        let recorder = Arc::new(Recorder::default());
        tracker.add_callback(recorder.clone());

        tracker.set_phase(ExportPhase::Cutting, "cutting");
        tracker.set_phase(ExportPhase::Done, "done");
        assert_eq!(
            *recorder.phases.lock().unwrap(),
            vec![ExportPhase::Cutting, ExportPhase::Done]
        );
        assert_eq!(recorder.overall.lock().unwrap().last(), Some(&100.0));
        assert_eq!(tracker.phase(), Some(ExportPhase::Done));
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_cancelled());
    }
}
