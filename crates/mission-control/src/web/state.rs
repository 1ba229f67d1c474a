//! Shared handler state.

use std::sync::Arc;

use crate::auth::CompositeVerifier;
use crate::context::SystemContext;
use crate::dispatch::Dispatcher;
use crate::telemetry::TelemetryAggregator;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<SystemContext>,
    pub dispatcher: Arc<Dispatcher>,
    pub verifier: Arc<CompositeVerifier>,
    pub aggregator: Arc<TelemetryAggregator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
