//! Application state
//!
//! Shared, read-only state passed to every handler: the request orchestrator
//! and the temp upload store. There is no mutable cross-request state in this
//! service; resource identifiers travel with the caller.

use crate::orchestrator::AssistantRequestHandler;
use crate::services::uploads::UploadStore;
use std::sync::Arc;

/// Per-process application state
pub struct AppState {
    /// The orchestration component handling `POST /get`
    pub handler: AssistantRequestHandler,
    /// Temporary storage for incoming file parts
    pub uploads: UploadStore,
}

/// Shared handle handed to the router
pub type SharedState = Arc<AppState>;
