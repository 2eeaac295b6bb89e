// Export interactor - runs exports on behalf of the command layer
//
// Errors are folded into a CommandOutcome naming the failing stage.

use std::path::Path;
use std::sync::Arc;

use tracing::error;

use crate::app::editor_interactor::CommandOutcome;
use crate::config::CutlistConfig;
use crate::domain::model::Project;
use crate::engine::{CancelToken, ExportReport, ExportRequest, Exporter, ProgressCallback, ProgressTracker};
use crate::ports::Encoder;

/// Outcome of an export request
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub outcome: CommandOutcome,
    pub report: Option<ExportReport>,
}

/// Starts exports with shared configuration and progress sinks
pub struct ExportInteractor {
    encoder: Arc<dyn Encoder>,
    config: CutlistConfig,
    callbacks: Vec<Arc<dyn ProgressCallback>>,
}

impl ExportInteractor {
    pub fn new(encoder: Arc<dyn Encoder>, config: CutlistConfig) -> Self {
        Self {
            encoder,
            config,
            callbacks: Vec::new(),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn config(&self) -> &CutlistConfig {
        &self.config
    }

    /// Export `project` to `output`; `cancel` aborts it from elsewhere
    pub async fn request_export(&self, project: &Project, output: &Path, cancel: CancelToken) -> ExportOutcome {
        let tracker = ProgressTracker::new(cancel);
        for callback in &self.callbacks {
            tracker.add_callback(callback.clone());
        }

        let request = ExportRequest {
            timeline: project.timeline.clone(),
            transitions: project.sorted_transitions(),
            output: output.to_path_buf(),
        };
        let exporter = Exporter::new(self.encoder.clone(), self.config.clone(), tracker);

        match exporter.export(&request).await {
            Ok(report) => ExportOutcome {
                outcome: CommandOutcome::ok(),
                report: Some(report),
            },
            Err(e) => {
                error!("Export to {} failed during {}: {}", output.display(), e.stage(), e);
                ExportOutcome {
                    outcome: CommandOutcome::failed(format!("{} stage: {}", e.stage(), e)),
                    report: None,
                }
            }
        }
    }
}
