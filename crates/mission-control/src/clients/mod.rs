//! # Collaborator Clients
//!
//! One typed client per collaborator service, all sharing a single
//! [`ServiceClient`] that owns the reqwest pool, the cached service token,
//! and the retry policy. Method names mirror the collaborator endpoints.

mod brain;
mod capabilities;
mod engineer;
mod librarian;
mod post_office;
mod service_client;
mod traffic_manager;

pub use brain::{BrainClient, LlmCallCounters};
pub use capabilities::{CapabilitiesClient, ExecuteActionRequest, PluginResult};
pub use engineer::EngineerClient;
pub use librarian::LibrarianClient;
pub use post_office::PostOfficeClient;
pub use service_client::ServiceClient;
pub use traffic_manager::{CreateAgentRequest, TrafficManagerClient};
