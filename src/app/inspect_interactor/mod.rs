// Inspect interactor - media metadata and cut plan previews

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::SmartCutSettings;
use crate::domain::model::MediaProbe;
use crate::error::{CutlistError, CutlistResult};
use crate::planner::{CutPlan, KeyframeLocator, SmartCutPlanner};
use crate::ports::{Encoder, TimeWindow};

/// Read-only queries against media files
pub struct InspectInteractor {
    encoder: Arc<dyn Encoder>,
    settings: SmartCutSettings,
}

impl InspectInteractor {
    pub fn new(encoder: Arc<dyn Encoder>, settings: SmartCutSettings) -> Self {
        Self { encoder, settings }
    }

    /// Probe duration and streams
    pub async fn inspect(&self, path: &Path) -> CutlistResult<MediaProbe> {
        if !path.is_file() {
            return Err(CutlistError::probe(format!("{} does not exist", path.display())));
        }
        let probe = self.encoder.probe(path).await?;
        info!(
            "{}: {:.3}s, {} streams",
            path.display(),
            probe.duration,
            probe.streams.len()
        );
        Ok(probe)
    }

    /// Keyframes of the primary video stream within `window`
    pub async fn keyframes(&self, path: &Path, window: TimeWindow) -> CutlistResult<Vec<f64>> {
        self.encoder.find_keyframes(path, window).await
    }

    /// How `[start, end)` of `path` would be realized
    pub async fn plan(&self, path: &Path, start: f64, end: f64) -> CutlistResult<CutPlan> {
        let locator = KeyframeLocator::new(self.encoder.clone(), &self.settings);
        SmartCutPlanner::new(locator, self.settings.clone())
            .plan(path, start, end)
            .await
    }
}
