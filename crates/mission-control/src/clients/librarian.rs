//! Librarian client: typed persistence access for mission documents and the
//! action-plan cache. Mission Control never sees the storage engine behind
//! these endpoints.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use mission_shared::types::Mission;
use mission_shared::{MissionControlError, MissionResult};

use super::ServiceClient;

/// Collection holding mission documents, keyed by mission id
const MISSIONS_COLLECTION: &str = "missions";
/// Cached action plans, cleared on each mission creation
const ACTION_PLANS_COLLECTION: &str = "actionPlans";

#[derive(Debug, Serialize)]
struct StoreRequest<'a> {
    id: &'a str,
    collection: &'a str,
    data: &'a Value,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct LibrarianClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl LibrarianClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn store_data(
        &self,
        id: &str,
        collection: &str,
        data: &Value,
    ) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/storeData", self.base_url),
                &StoreRequest {
                    id,
                    collection,
                    data,
                },
            )
            .await
            .map_err(storage_error)
    }

    pub async fn load_data(&self, id: &str, collection: &str) -> MissionResult<Value> {
        let url = format!("{}/loadData/{id}?collection={collection}", self.base_url);
        match self.client.get_json::<Value>(&url).await {
            // Librarian wraps documents as { data: ... }
            Ok(Value::Object(mut obj)) if obj.contains_key("data") => {
                Ok(obj.remove("data").unwrap_or(Value::Null))
            }
            Ok(other) => Ok(other),
            Err(e @ MissionControlError::NotFound(_)) => Err(e),
            Err(e) => Err(storage_error(e)),
        }
    }

    pub async fn query_data(&self, collection: &str, query: &Value) -> MissionResult<Vec<Value>> {
        let response: QueryResponse = self
            .client
            .post_json(
                &format!("{}/queryData", self.base_url),
                &json!({ "collection": collection, "query": query }),
            )
            .await
            .map_err(storage_error)?;
        Ok(response.data)
    }

    pub async fn delete_collection(&self, collection: &str) -> MissionResult<()> {
        self.client
            .delete(&format!(
                "{}/deleteCollection?collection={collection}",
                self.base_url
            ))
            .await
            .map_err(storage_error)
    }

    // ------------------------------------------------------------------
    // Mission document helpers
    // ------------------------------------------------------------------

    pub async fn store_mission(&self, mission: &Mission) -> MissionResult<()> {
        let doc = serde_json::to_value(mission)
            .map_err(|e| MissionControlError::Internal(format!("mission serialization: {e}")))?;
        self.store_data(&mission.id.to_string(), MISSIONS_COLLECTION, &doc)
            .await
    }

    /// Load a persisted mission. `NotFound` when no document exists.
    pub async fn load_mission(&self, mission_id: Uuid) -> MissionResult<Mission> {
        let doc = self
            .load_data(&mission_id.to_string(), MISSIONS_COLLECTION)
            .await
            .map_err(|e| match e {
                MissionControlError::NotFound(_) => {
                    MissionControlError::NotFound(format!("mission {mission_id}"))
                }
                other => other,
            })?;
        serde_json::from_value(doc).map_err(|e| {
            MissionControlError::Storage(format!("mission {mission_id} document malformed: {e}"))
        })
    }

    /// Persisted missions owned by a user. Documents that fail to decode
    /// are skipped with a warning rather than failing the listing.
    pub async fn missions_for_user(&self, user_id: &str) -> MissionResult<Vec<Mission>> {
        let docs = self
            .query_data(MISSIONS_COLLECTION, &json!({ "userId": user_id }))
            .await?;
        let mut missions = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<Mission>(doc) {
                Ok(mission) => missions.push(mission),
                Err(e) => warn!(user_id = %user_id, error = %e, "Skipping malformed mission document"),
            }
        }
        Ok(missions)
    }

    /// Clear the cached action-plan collection (best-effort at creation)
    pub async fn clear_action_plans(&self) -> MissionResult<()> {
        self.delete_collection(ACTION_PLANS_COLLECTION).await
    }
}

/// Librarian failures surface as Storage unless they are lookups
fn storage_error(e: MissionControlError) -> MissionControlError {
    match e {
        MissionControlError::NotFound(_) => e,
        MissionControlError::CollaboratorUnavailable(msg)
        | MissionControlError::CollaboratorContract(msg)
        | MissionControlError::Internal(msg) => MissionControlError::Storage(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_request_shape() {
        let data = json!({"goal": "G"});
        let req = StoreRequest {
            id: "m1",
            collection: MISSIONS_COLLECTION,
            data: &data,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["id"], "m1");
        assert_eq!(v["collection"], "missions");
        assert_eq!(v["data"]["goal"], "G");
    }

    #[test]
    fn test_query_response_defaults_to_empty() {
        let resp: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.data.is_empty());
    }

    #[test]
    fn test_storage_error_mapping_preserves_not_found() {
        let e = storage_error(MissionControlError::NotFound("m".into()));
        assert!(matches!(e, MissionControlError::NotFound(_)));

        let e = storage_error(MissionControlError::CollaboratorUnavailable("down".into()));
        assert!(matches!(e, MissionControlError::Storage(_)));
    }
}
