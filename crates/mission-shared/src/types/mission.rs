//! # Mission Entity
//!
//! The central entity owned by Mission Control, with the lifecycle state
//! machine encoded on [`MissionStatus`]. The persisted JSON shape (camelCase)
//! is the Librarian document format, so a stored mission round-trips into an
//! equivalent in-memory entity.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{MissionControlError, MissionResult};

/// Mission lifecycle status.
///
/// Transitions:
/// - Initializing → Running, or Error on failed start
/// - Running ↔ Paused
/// - Running, Paused, Completed, Error → Aborted (terminal)
/// - Running, Completed, Error → Reflecting → Running | Completed | Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionStatus {
    Initializing,
    Running,
    Paused,
    Aborted,
    Completed,
    Error,
    Reflecting,
}

impl MissionStatus {
    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        match (self, next) {
            (Initializing, Running) | (Initializing, Error) => true,
            (Running, Paused)
            | (Running, Aborted)
            | (Running, Completed)
            | (Running, Error)
            | (Running, Reflecting) => true,
            (Paused, Running) | (Paused, Aborted) => true,
            (Completed, Aborted) | (Completed, Reflecting) => true,
            (Error, Aborted) | (Error, Reflecting) => true,
            (Reflecting, Running) | (Reflecting, Completed) | (Reflecting, Error) => true,
            _ => false,
        }
    }

    /// Aborted never leaves memory again; Completed is terminal once
    /// reflection has decided the mission is done.
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionStatus::Aborted)
    }

    /// States the telemetry aggregator samples on each tick
    pub fn is_telemetry_eligible(self) -> bool {
        matches!(
            self,
            MissionStatus::Running | MissionStatus::Completed | MissionStatus::Error
        )
    }

    /// States from which quiescence triggers reflection
    pub fn is_reflection_candidate(self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Error)
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissionStatus::Initializing => "Initializing",
            MissionStatus::Running => "Running",
            MissionStatus::Paused => "Paused",
            MissionStatus::Aborted => "Aborted",
            MissionStatus::Completed => "Completed",
            MissionStatus::Error => "Error",
            MissionStatus::Reflecting => "Reflecting",
        };
        f.write_str(s)
    }
}

/// A file reference attached to a mission. Owned by its mission; there is no
/// cross-mission ref-counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deliverable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

/// The central mission entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_context: Option<String>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attached_files: Vec<FileRef>,
}

impl Mission {
    /// Create a mission in the Initializing state with a fresh id.
    ///
    /// An empty or missing name defaults to a timestamped one.
    pub fn new(
        user_id: impl Into<String>,
        goal: impl Into<String>,
        name: Option<String>,
        mission_context: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => default_mission_name(now),
        };
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name,
            goal: goal.into(),
            mission_context,
            status: MissionStatus::Initializing,
            created_at: now,
            updated_at: now,
            attached_files: Vec::new(),
        }
    }

    /// Bump `updated_at`, keeping it monotonically non-decreasing even if
    /// the wall clock steps backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Transition to `next` if the state machine permits it
    pub fn transition(&mut self, next: MissionStatus) -> MissionResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MissionControlError::Validation(format!(
                "illegal mission transition {} -> {} for mission {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Append a file reference; a duplicate `id` is a no-op
    pub fn add_attached_file(&mut self, file: FileRef) -> bool {
        if self.attached_files.iter().any(|f| f.id == file.id) {
            return false;
        }
        self.attached_files.push(file);
        self.touch();
        true
    }

    /// Remove a file reference by id; an unknown id is a no-op
    pub fn remove_attached_file(&mut self, file_id: &str) -> bool {
        let before = self.attached_files.len();
        self.attached_files.retain(|f| f.id != file_id);
        let removed = self.attached_files.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Project to the list/summary shape
    pub fn summary(&self) -> MissionSummary {
        MissionSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            goal: self.goal.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Projection returned by mission listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSummary {
    pub id: Uuid,
    pub name: String,
    pub status: MissionStatus,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default mission name: ISO-8601 UTC timestamp with colons replaced by
/// hyphens so the name stays filesystem- and URL-friendly.
pub fn default_mission_name(at: DateTime<Utc>) -> String {
    format!(
        "Mission {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true).replace(':', "-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use MissionStatus::*;
        assert!(Initializing.can_transition_to(Running));
        assert!(Initializing.can_transition_to(Error));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Running.can_transition_to(Aborted));
        assert!(Paused.can_transition_to(Aborted));
        assert!(Completed.can_transition_to(Aborted));
        assert!(Error.can_transition_to(Aborted));
        assert!(Completed.can_transition_to(Reflecting));
        assert!(Error.can_transition_to(Reflecting));
        assert!(Running.can_transition_to(Reflecting));
        assert!(Reflecting.can_transition_to(Running));
        assert!(Reflecting.can_transition_to(Completed));
        assert!(Reflecting.can_transition_to(Error));
    }

    #[test]
    fn test_illegal_transitions() {
        use MissionStatus::*;
        assert!(!Initializing.can_transition_to(Paused));
        assert!(!Initializing.can_transition_to(Aborted));
        assert!(!Paused.can_transition_to(Reflecting));
        assert!(!Aborted.can_transition_to(Running));
        assert!(!Aborted.can_transition_to(Reflecting));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Reflecting.can_transition_to(Paused));
    }

    #[test]
    fn test_transition_rejects_and_preserves_status() {
        let mut mission = Mission::new("u1", "G", Some("N".into()), None);
        let err = mission.transition(MissionStatus::Paused).unwrap_err();
        assert!(matches!(err, MissionControlError::Validation(_)));
        assert_eq!(mission.status, MissionStatus::Initializing);

        mission.transition(MissionStatus::Running).unwrap();
        assert_eq!(mission.status, MissionStatus::Running);
    }

    #[test]
    fn test_new_mission_defaults() {
        let mission = Mission::new("u1", "build the thing", None, None);
        assert_eq!(mission.status, MissionStatus::Initializing);
        assert_eq!(mission.user_id, "u1");
        assert!(mission.name.starts_with("Mission "));
        assert!(!mission.name.contains(':'));
        assert!(mission.attached_files.is_empty());
        assert_eq!(mission.created_at, mission.updated_at);
    }

    #[test]
    fn test_blank_name_falls_back_to_default() {
        let mission = Mission::new("u1", "g", Some("   ".into()), None);
        assert!(mission.name.starts_with("Mission "));
    }

    #[test]
    fn test_default_mission_name_replaces_colons() {
        let at = DateTime::parse_from_rfc3339("2026-08-01T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(default_mission_name(at), "Mission 2026-08-01T12-30-45Z");
    }

    fn file_ref(id: &str) -> FileRef {
        FileRef {
            id: id.to_string(),
            original_name: "report.pdf".to_string(),
            size: 1024,
            mime_type: "application/pdf".to_string(),
            uploaded_at: Utc::now(),
            uploaded_by: "u1".to_string(),
            description: None,
            is_deliverable: None,
            step_id: None,
        }
    }

    #[test]
    fn test_add_attached_file_is_idempotent_by_id() {
        let mut mission = Mission::new("u1", "g", None, None);
        assert!(mission.add_attached_file(file_ref("f1")));
        assert!(!mission.add_attached_file(file_ref("f1")));
        assert_eq!(mission.attached_files.len(), 1);
    }

    #[test]
    fn test_remove_attached_file_ignores_unknown_id() {
        let mut mission = Mission::new("u1", "g", None, None);
        mission.add_attached_file(file_ref("f1"));
        assert!(!mission.remove_attached_file("nope"));
        assert!(mission.remove_attached_file("f1"));
        assert!(mission.attached_files.is_empty());
    }

    #[test]
    fn test_persisted_roundtrip_preserves_value() {
        let mut mission = Mission::new("u1", "goal", Some("N".into()), Some("ctx".into()));
        mission.add_attached_file(file_ref("f1"));
        mission.transition(MissionStatus::Running).unwrap();

        let doc = serde_json::to_value(&mission).unwrap();
        // camelCase on the wire
        assert!(doc.get("userId").is_some());
        assert!(doc.get("missionContext").is_some());
        assert!(doc.get("attachedFiles").is_some());

        let restored: Mission = serde_json::from_value(doc).unwrap();
        assert_eq!(restored, mission);
    }

    #[test]
    fn test_status_serializes_as_plain_variant_name() {
        let v = serde_json::to_value(MissionStatus::Running).unwrap();
        assert_eq!(v, serde_json::json!("Running"));
        let s: MissionStatus = serde_json::from_value(serde_json::json!("Reflecting")).unwrap();
        assert_eq!(s, MissionStatus::Reflecting);
    }

    #[test]
    fn test_summary_projection() {
        let mission = Mission::new("u1", "G", Some("N".into()), None);
        let summary = mission.summary();
        assert_eq!(summary.id, mission.id);
        assert_eq!(summary.name, "N");
        assert_eq!(summary.goal, "G");
        assert_eq!(summary.status, MissionStatus::Initializing);
    }
}
