//! Route table and handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::{middleware, Extension, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use mission_shared::types::{FileRef, MessageEnvelope, SecurityContext};
use mission_shared::MissionControlError;

use super::{ApiError, AppState};
use crate::auth::require_auth;
use crate::dispatch::Caller;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/message", post(post_message))
        .route("/agentStatisticsUpdate", post(agent_statistics_update))
        .route("/userInputResponse", post(user_input_response))
        .route("/missions/{missionId}/files/add", post(add_mission_file))
        .route(
            "/missions/{missionId}/files/remove",
            post(remove_mission_file),
        )
        .route(
            "/missions/{missionId}/files/{fileId}",
            delete(delete_mission_file),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mission-control",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Common envelope ingress. The caller identity comes from the verified
/// token, not the envelope.
async fn post_message(
    State(state): State<AppState>,
    Extension(security): Extension<SecurityContext>,
    Json(envelope): Json<MessageEnvelope>,
) -> Result<Json<Value>, ApiError> {
    let caller = Caller::http(security.subject);
    let outcome = state.dispatcher.dispatch(envelope, caller).await?;

    let mut body = json!({ "message": outcome.message });
    if let Some(result) = outcome.result {
        body["result"] = result;
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentStatisticsUpdate {
    #[allow(dead_code)]
    agent_id: Option<String>,
    mission_id: String,
    #[allow(dead_code)]
    statistics: Option<Value>,
    #[allow(dead_code)]
    timestamp: Option<String>,
}

/// Agent-side statistics notifications. Acknowledged immediately; the push
/// to subscribed clients happens asynchronously.
async fn agent_statistics_update(
    State(state): State<AppState>,
    Json(update): Json<AgentStatisticsUpdate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mission_id = Uuid::parse_str(&update.mission_id).map_err(|_| {
        ApiError(MissionControlError::Validation(format!(
            "malformed missionId: {}",
            update.mission_id
        )))
    })?;

    debug!(mission_id = %mission_id, "Agent statistics update received");
    state.aggregator.trigger_mission_push(mission_id);

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Statistics update acknowledged" })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInputResponseBody {
    request_id: String,
    #[serde(default)]
    response: Value,
}

/// Human-input response routing: 404 when the request id is unknown.
async fn user_input_response(
    State(state): State<AppState>,
    Json(body): Json<UserInputResponseBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .dispatcher
        .lifecycle()
        .resolve_user_input(&body.request_id, body.response)
        .await?;
    Ok(Json(json!({ "message": "User input routed" })))
}

async fn add_mission_file(
    State(state): State<AppState>,
    Path(mission_id): Path<Uuid>,
    Json(file): Json<FileRef>,
) -> Result<Json<Value>, ApiError> {
    state
        .dispatcher
        .lifecycle()
        .add_attached_file(mission_id, file)
        .await?;
    Ok(Json(json!({ "message": "File attached" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveFileBody {
    file_id: String,
}

async fn remove_mission_file(
    State(state): State<AppState>,
    Path(mission_id): Path<Uuid>,
    Json(body): Json<RemoveFileBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .dispatcher
        .lifecycle()
        .remove_attached_file(mission_id, &body.file_id)
        .await?;
    Ok(Json(json!({ "message": "File removed" })))
}

/// Semantically equivalent to the POST remove body form
async fn delete_mission_file(
    State(state): State<AppState>,
    Path((mission_id, file_id)): Path<(Uuid, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .dispatcher
        .lifecycle()
        .remove_attached_file(mission_id, &file_id)
        .await?;
    Ok(Json(json!({ "message": "File removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    use mission_shared::config::MissionControlConfig;

    use crate::auth::CompositeVerifier;
    use crate::clients::ServiceClient;
    use crate::context::SystemContext;
    use crate::dispatch::Dispatcher;
    use crate::reflection::ReflectionCoordinator;
    use crate::telemetry::TelemetryAggregator;

    fn test_state() -> AppState {
        let config = MissionControlConfig::default();
        let context = SystemContext::new(config.clone()).unwrap();
        let dispatcher = Arc::new(Dispatcher::new(context.clone()));
        let service_client = Arc::new(ServiceClient::new(&config).unwrap());
        let verifier = Arc::new(CompositeVerifier::from_config(&config, service_client));
        let reflection = ReflectionCoordinator::new(context.clone());
        let aggregator = TelemetryAggregator::new(context.clone(), reflection);
        AppState {
            context,
            dispatcher,
            verifier,
            aggregator,
        }
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_requires_bearer_token() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"LIST_MISSIONS","sender":"ui"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_input_response_requires_bearer_token() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/userInputResponse")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"requestId":"r1","response":"yes"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
