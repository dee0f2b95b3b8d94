use mindmap_core::{Extractor, IntakePolicy};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub extractor: Extractor,
    pub policy: IntakePolicy,
}
