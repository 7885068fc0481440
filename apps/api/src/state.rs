use std::sync::Arc;

use crate::flow::FlowManager;
use crate::session::SessionRegistry;
use crate::stores::{CandidateStore, RubricStore};

/// Shared application state injected into all route handlers via Axum
/// extractors. Everything here is explicitly constructed in `main`; there is
/// no global mutable state beyond the session registry.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<FlowManager>,
    pub sessions: Arc<SessionRegistry>,
    pub rubrics: Arc<dyn RubricStore>,
    pub candidates: Arc<dyn CandidateStore>,
}
