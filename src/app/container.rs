use std::sync::Arc;

use crate::adapters::FfmpegEncoder;
use crate::app::{
    editor_interactor::EditorInteractor, export_interactor::ExportInteractor,
    inspect_interactor::InspectInteractor,
};
use crate::config::CutlistConfig;
use crate::domain::model::Project;
use crate::engine::LoggingProgress;
use crate::ports::Encoder;

pub trait AppContainer: Send + Sync {
    fn editor(&self, project: Project) -> EditorInteractor;
    fn inspect_interactor(&self) -> Arc<InspectInteractor>;
    fn export_interactor(&self) -> Arc<ExportInteractor>;
}

/// Wires interactors to one shared encoder
pub struct DefaultAppContainer {
    config: CutlistConfig,
    inspect_interactor: Arc<InspectInteractor>,
    export_interactor: Arc<ExportInteractor>,
}

impl DefaultAppContainer {
    /// Container backed by the ffmpeg command line tools
    pub fn new(config: CutlistConfig) -> Self {
        let encoder: Arc<dyn Encoder> = Arc::new(FfmpegEncoder::new(&config.encoder));
        Self::with_encoder(config, encoder)
    }

    /// Container around any encoder, e.g. a test double
    pub fn with_encoder(config: CutlistConfig, encoder: Arc<dyn Encoder>) -> Self {
        let inspect_interactor = Arc::new(InspectInteractor::new(
            Arc::clone(&encoder),
            config.smart_cut.clone(),
        ));
        let export_interactor = Arc::new(
            ExportInteractor::new(Arc::clone(&encoder), config.clone())
                .with_callback(Arc::new(LoggingProgress)),
        );

        Self {
            config,
            inspect_interactor,
            export_interactor,
        }
    }

    pub fn config(&self) -> &CutlistConfig {
        &self.config
    }
}

impl AppContainer for DefaultAppContainer {
    fn editor(&self, project: Project) -> EditorInteractor {
        EditorInteractor::from_project(project, self.config.edl.clone())
    }

    fn inspect_interactor(&self) -> Arc<InspectInteractor> {
        Arc::clone(&self.inspect_interactor)
    }

    fn export_interactor(&self) -> Arc<ExportInteractor> {
        Arc::clone(&self.export_interactor)
    }
}
