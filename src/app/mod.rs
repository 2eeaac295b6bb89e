// Application layer - Use case interactors

pub mod container;
pub mod editor_interactor;
pub mod export_interactor;
pub mod inspect_interactor;

// Re-export interactors
pub use editor_interactor::{CommandOutcome, EditOp, EditorInteractor};
pub use export_interactor::{ExportInteractor, ExportOutcome};
pub use inspect_interactor::InspectInteractor;
