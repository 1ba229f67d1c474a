//! # Mission Registry
//!
//! Process-wide mutable state behind a typed interface: the in-memory
//! mission table, the client → mission subscription index, and the
//! pending-input correlation table. Each map uses per-key locking
//! (`DashMap`), so a mission's state transition is atomic under its entry
//! lock: read current status, check legality, write.
//!
//! Persistence happens outside these locks, on a snapshot.

mod pending_inputs;

pub use pending_inputs::PendingInputTable;

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use mission_shared::types::{Mission, MissionStatus, MissionSummary};
use mission_shared::{MissionControlError, MissionResult};

/// In-memory mission table plus the client subscription index
#[derive(Debug, Default)]
pub struct MissionRegistry {
    missions: DashMap<Uuid, Mission>,
    subscriptions: DashMap<String, HashSet<Uuid>>,
}

impl MissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mission; an existing in-memory copy wins (used by Load)
    pub fn insert_if_absent(&self, mission: Mission) -> bool {
        match self.missions.entry(mission.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(mission);
                true
            }
        }
    }

    pub fn insert(&self, mission: Mission) {
        self.missions.insert(mission.id, mission);
    }

    pub fn contains(&self, mission_id: &Uuid) -> bool {
        self.missions.contains_key(mission_id)
    }

    /// Snapshot a mission by value
    pub fn get(&self, mission_id: &Uuid) -> Option<Mission> {
        self.missions.get(mission_id).map(|m| m.clone())
    }

    /// Current status without cloning the whole mission
    pub fn status_of(&self, mission_id: &Uuid) -> Option<MissionStatus> {
        self.missions.get(mission_id).map(|m| m.status)
    }

    /// Mutate a mission under its entry lock, returning a post-mutation
    /// snapshot. `None` when the mission is unknown.
    pub fn with_mission_mut<R>(
        &self,
        mission_id: &Uuid,
        f: impl FnOnce(&mut Mission) -> R,
    ) -> Option<(R, Mission)> {
        self.missions.get_mut(mission_id).map(|mut entry| {
            let r = f(&mut entry);
            (r, entry.clone())
        })
    }

    /// Atomic state transition: legality is checked and applied under the
    /// entry lock. Returns the post-transition snapshot.
    pub fn transition(&self, mission_id: &Uuid, next: MissionStatus) -> MissionResult<Mission> {
        let mut entry = self.missions.get_mut(mission_id).ok_or_else(|| {
            MissionControlError::NotFound(format!("mission {mission_id} is not active"))
        })?;
        entry.transition(next)?;
        Ok(entry.clone())
    }

    /// Transition into Reflecting from a quiescent terminal-candidate state,
    /// returning the prior status and the post-transition snapshot.
    ///
    /// The Reflecting status is itself the re-entry guard: a mission already
    /// Reflecting fails the candidate check and is not retriggered.
    pub fn begin_reflection(&self, mission_id: &Uuid) -> Option<(MissionStatus, Mission)> {
        let mut entry = self.missions.get_mut(mission_id)?;
        if !entry.status.is_reflection_candidate() {
            return None;
        }
        let prior = entry.status;
        // Candidate states always permit Reflecting, so this cannot fail.
        entry.transition(MissionStatus::Reflecting).ok()?;
        debug!(mission_id = %mission_id, prior_status = %prior, "Mission entered reflection");
        Some((prior, entry.clone()))
    }

    /// Remove a mission from memory and from every client's subscription
    /// set. Clients left with no missions are dropped from the index.
    pub fn remove(&self, mission_id: &Uuid) -> Option<Mission> {
        let removed = self.missions.remove(mission_id).map(|(_, m)| m);
        if removed.is_some() {
            self.subscriptions.retain(|_, missions| {
                missions.remove(mission_id);
                !missions.is_empty()
            });
        }
        removed
    }

    /// Subscribe a client to a mission; re-subscribing is a no-op.
    ///
    /// Subscriptions only end with the mission: `remove()` purges the id
    /// from every client set and drops clients whose set empties.
    pub fn subscribe(&self, client_id: &str, mission_id: Uuid) {
        self.subscriptions
            .entry(client_id.to_string())
            .or_default()
            .insert(mission_id);
    }

    /// Clients subscribed to a mission
    pub fn subscribers_of(&self, mission_id: &Uuid) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value().contains(mission_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Mission → subscribed clients, the fan-out view used by each
    /// telemetry tick
    pub fn subscription_fanout(&self) -> HashMap<Uuid, Vec<String>> {
        let mut fanout: HashMap<Uuid, Vec<String>> = HashMap::new();
        for entry in self.subscriptions.iter() {
            for mission_id in entry.value() {
                fanout
                    .entry(*mission_id)
                    .or_default()
                    .push(entry.key().clone());
            }
        }
        fanout
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// In-memory missions owned by a user, projected for listing
    pub fn summaries_for_user(&self, user_id: &str) -> Vec<MissionSummary> {
        self.missions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.summary())
            .collect()
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_mission(user: &str) -> Mission {
        let mut m = Mission::new(user, "goal", None, None);
        m.transition(MissionStatus::Running).unwrap();
        m
    }

    #[test]
    fn test_insert_get_snapshot() {
        let registry = MissionRegistry::new();
        let mission = running_mission("u1");
        let id = mission.id;
        registry.insert(mission.clone());
        assert!(registry.contains(&id));
        assert_eq!(registry.get(&id).unwrap(), mission);
        assert_eq!(registry.status_of(&id), Some(MissionStatus::Running));
    }

    #[test]
    fn test_insert_if_absent_keeps_in_memory_copy() {
        let registry = MissionRegistry::new();
        let mission = running_mission("u1");
        let id = mission.id;
        registry.insert(mission.clone());

        let mut stale = mission.clone();
        stale.name = "stale".to_string();
        assert!(!registry.insert_if_absent(stale));
        assert_eq!(registry.get(&id).unwrap().name, mission.name);
    }

    #[test]
    fn test_transition_checks_legality_atomically() {
        let registry = MissionRegistry::new();
        let mission = running_mission("u1");
        let id = mission.id;
        registry.insert(mission);

        let paused = registry.transition(&id, MissionStatus::Paused).unwrap();
        assert_eq!(paused.status, MissionStatus::Paused);

        let err = registry
            .transition(&id, MissionStatus::Reflecting)
            .unwrap_err();
        assert!(matches!(err, MissionControlError::Validation(_)));
        assert_eq!(registry.status_of(&id), Some(MissionStatus::Paused));
    }

    #[test]
    fn test_transition_unknown_mission_is_not_found() {
        let registry = MissionRegistry::new();
        let err = registry
            .transition(&Uuid::new_v4(), MissionStatus::Paused)
            .unwrap_err();
        assert!(matches!(err, MissionControlError::NotFound(_)));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = MissionRegistry::new();
        let id = Uuid::new_v4();
        registry.subscribe("c1", id);
        registry.subscribe("c1", id);
        assert_eq!(registry.subscribers_of(&id), vec!["c1".to_string()]);
    }

    #[test]
    fn test_remove_purges_every_subscription() {
        let registry = MissionRegistry::new();
        let mission = running_mission("u1");
        let id = mission.id;
        let other = Uuid::new_v4();
        registry.insert(mission);
        registry.subscribe("c1", id);
        registry.subscribe("c2", id);
        registry.subscribe("c2", other);

        registry.remove(&id);

        assert!(!registry.contains(&id));
        assert!(registry.subscribers_of(&id).is_empty());
        // c1 had only the removed mission and is gone; c2 keeps the other
        assert_eq!(registry.subscribers_of(&other), vec!["c2".to_string()]);
    }

    #[test]
    fn test_begin_reflection_requires_candidate_state() {
        let registry = MissionRegistry::new();
        let mission = running_mission("u1");
        let id = mission.id;
        registry.insert(mission);

        // Running is not quiescent-candidate
        assert!(registry.begin_reflection(&id).is_none());

        registry.transition(&id, MissionStatus::Completed).unwrap();
        let (prior, reflecting) = registry.begin_reflection(&id).unwrap();
        assert_eq!(prior, MissionStatus::Completed);
        assert_eq!(reflecting.status, MissionStatus::Reflecting);

        // Already Reflecting: the guard rejects re-entry
        assert!(registry.begin_reflection(&id).is_none());
    }

    #[test]
    fn test_subscription_fanout_groups_clients_by_mission() {
        let registry = MissionRegistry::new();
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        registry.subscribe("c1", m1);
        registry.subscribe("c2", m1);
        registry.subscribe("c2", m2);

        let fanout = registry.subscription_fanout();
        let mut m1_clients = fanout.get(&m1).unwrap().clone();
        m1_clients.sort();
        assert_eq!(m1_clients, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(fanout.get(&m2).unwrap(), &vec!["c2".to_string()]);
    }

    #[test]
    fn test_summaries_for_user_filters_by_owner() {
        let registry = MissionRegistry::new();
        registry.insert(running_mission("u1"));
        registry.insert(running_mission("u1"));
        registry.insert(running_mission("u2"));

        assert_eq!(registry.summaries_for_user("u1").len(), 2);
        assert_eq!(registry.summaries_for_user("u2").len(), 1);
        assert!(registry.summaries_for_user("u3").is_empty());
    }
}
