//! # System Context
//!
//! The shared dependency bundle handed to every component: configuration,
//! collaborator clients, the mission registry, the pending-input table, and
//! the process-wide cancellation token. Constructed once at bootstrap and
//! shared as `Arc<SystemContext>`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mission_shared::config::MissionControlConfig;
use mission_shared::MissionResult;

use crate::clients::{
    BrainClient, CapabilitiesClient, EngineerClient, LibrarianClient, PostOfficeClient,
    ServiceClient, TrafficManagerClient,
};
use crate::registry::{MissionRegistry, PendingInputTable};

#[derive(Debug)]
pub struct SystemContext {
    pub config: MissionControlConfig,
    pub registry: MissionRegistry,
    pub pending_inputs: PendingInputTable,
    /// Shared authenticated HTTP client behind every typed client
    pub service_client: Arc<ServiceClient>,
    pub traffic_manager: TrafficManagerClient,
    pub librarian: LibrarianClient,
    pub brain: BrainClient,
    pub engineer: EngineerClient,
    pub capabilities: CapabilitiesClient,
    pub post_office: PostOfficeClient,
    pub shutdown: CancellationToken,
}

impl SystemContext {
    pub fn new(config: MissionControlConfig) -> MissionResult<Arc<Self>> {
        let service_client = Arc::new(ServiceClient::new(&config)?);
        let endpoints = &config.collaborators;

        let context = Self {
            traffic_manager: TrafficManagerClient::new(
                service_client.clone(),
                endpoints.traffic_manager_url.clone(),
            ),
            librarian: LibrarianClient::new(
                service_client.clone(),
                endpoints.librarian_url.clone(),
            ),
            brain: BrainClient::new(service_client.clone(), endpoints.brain_url.clone()),
            engineer: EngineerClient::new(service_client.clone(), endpoints.engineer_url.clone()),
            capabilities: CapabilitiesClient::new(
                service_client.clone(),
                endpoints.capabilities_manager_url.clone(),
            ),
            post_office: PostOfficeClient::new(
                service_client.clone(),
                endpoints.post_office_url.clone(),
            ),
            service_client,
            registry: MissionRegistry::new(),
            pending_inputs: PendingInputTable::new(),
            shutdown: CancellationToken::new(),
            config,
        };

        Ok(Arc::new(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builds_from_default_config() {
        let context = SystemContext::new(MissionControlConfig::default()).unwrap();
        assert_eq!(context.registry.mission_count(), 0);
        assert!(context.pending_inputs.is_empty());
        assert!(!context.shutdown.is_cancelled());
    }
}
