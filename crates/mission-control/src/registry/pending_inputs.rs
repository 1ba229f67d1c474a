//! Correlation table for outstanding human-input requests.
//!
//! One entry per `requestId`, created when a step declares it needs a user
//! response and removed on the matching response or on mission abort.

use dashmap::DashMap;
use uuid::Uuid;

use mission_shared::types::PendingInput;
use mission_shared::{MissionControlError, MissionResult};

#[derive(Debug, Default)]
pub struct PendingInputTable {
    inner: DashMap<String, PendingInput>,
}

impl PendingInputTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending input. A duplicate `requestId` is rejected: the
    /// table holds at most one entry per request.
    pub fn register(&self, input: PendingInput) -> MissionResult<()> {
        match self.inner.entry(input.request_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(MissionControlError::Validation(
                format!("duplicate pending input request {}", input.request_id),
            )),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(input);
                Ok(())
            }
        }
    }

    /// Remove and return the entry for a response. `None` when the request
    /// is unknown or already resolved.
    pub fn resolve(&self, request_id: &str) -> Option<PendingInput> {
        self.inner.remove(request_id).map(|(_, input)| input)
    }

    /// Drop every entry belonging to an aborted mission
    pub fn remove_for_mission(&self, mission_id: &Uuid) {
        self.inner.retain(|_, input| input.mission_id != *mission_id);
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.inner.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(request_id: &str, mission_id: Uuid) -> PendingInput {
        PendingInput {
            request_id: request_id.to_string(),
            mission_id,
            step_id: "s1".to_string(),
            agent_id: "a1".to_string(),
        }
    }

    #[test]
    fn test_register_and_resolve_exactly_once() {
        let table = PendingInputTable::new();
        let mission_id = Uuid::new_v4();
        table.register(input("r1", mission_id)).unwrap();
        assert!(table.contains("r1"));

        let resolved = table.resolve("r1").unwrap();
        assert_eq!(resolved.mission_id, mission_id);
        assert_eq!(resolved.step_id, "s1");

        // Second resolution finds nothing
        assert!(table.resolve("r1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_request_id_rejected() {
        let table = PendingInputTable::new();
        let mission_id = Uuid::new_v4();
        table.register(input("r1", mission_id)).unwrap();
        let err = table.register(input("r1", mission_id)).unwrap_err();
        assert!(matches!(err, MissionControlError::Validation(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_for_mission_is_scoped() {
        let table = PendingInputTable::new();
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        table.register(input("r1", m1)).unwrap();
        table.register(input("r2", m1)).unwrap();
        table.register(input("r3", m2)).unwrap();

        table.remove_for_mission(&m1);

        assert!(!table.contains("r1"));
        assert!(!table.contains("r2"));
        assert!(table.contains("r3"));
    }
}
