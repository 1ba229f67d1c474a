//! Axum middleware guarding the inbound HTTP surface.
//!
//! Extracts the bearer token, verifies it through the composite verifier,
//! and caches the resulting [`SecurityContext`] on the request extensions
//! so handlers read the caller identity without re-verifying.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::warn;

use crate::web::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")));

    let Some(token) = token else {
        return unauthorized("Authentication required. Provide a bearer token.");
    };

    match state.verifier.verify(token).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Bearer token verification failed");
            unauthorized("Invalid or expired credentials")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": message })),
    )
        .into_response()
}
