//! HTTP front for remote lookups.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::coordinates::parse_coordinates;
use crate::error::LocatorError;
use crate::models::Coordinate;
use crate::service::PsapLocator;

#[derive(Clone)]
pub struct AppState {
    pub locator: Arc<PsapLocator>,
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub coordinates: Option<String>,
}

/// Body of a successful lookup; `location` is null when the input is not a
/// recognized coordinate format.
#[derive(Debug, Serialize)]
pub struct LookupResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub location: Option<Coordinate>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

fn success<T: Serialize>(data: T, coordinates: &str) -> Response {
    (
        StatusCode::OK,
        Json(LookupResponse {
            success: true,
            data,
            location: parse_coordinates(coordinates),
        }),
    )
        .into_response()
}

fn failure(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error,
        }),
    )
        .into_response()
}

/// Builds the router; `bearer_token` guards everything but `/health`.
pub fn router(state: AppState, bearer_token: Option<String>) -> Router {
    let mut router = Router::new()
        .route("/api/psap/lookup", post(lookup_primary))
        .route("/api/psap/nearby", post(lookup_nearby))
        .with_state(state);

    if let Some(expected) = bearer_token {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }

    router.route("/health", get(|| async { "ok" }))
}

/// Pulls non-blank coordinates out of the body, or builds the 400 reply.
fn required_coordinates(
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<String, Response> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected lookup body");
        failure(rejection.status(), rejection.body_text())
    })?;
    req.coordinates
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            failure(
                StatusCode::BAD_REQUEST,
                "Coordinates are required".to_string(),
            )
        })
}

fn error_status(err: &LocatorError) -> StatusCode {
    match err.root() {
        LocatorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn lookup_primary(
    State(state): State<AppState>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Response {
    let coordinates = match required_coordinates(payload) {
        Ok(coordinates) => coordinates,
        Err(response) => return response,
    };
    tracing::info!(coordinates = %coordinates, "PSAP lookup request received");

    match state.locator.lookup_primary(&coordinates).await {
        Ok(record) => success(record, &coordinates),
        Err(e) => {
            tracing::error!(error = %e, "Error in PSAP lookup");
            failure(error_status(&e), e.to_string())
        }
    }
}

async fn lookup_nearby(
    State(state): State<AppState>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Response {
    let coordinates = match required_coordinates(payload) {
        Ok(coordinates) => coordinates,
        Err(response) => return response,
    };
    tracing::info!(coordinates = %coordinates, "Nearby PSAP request received");

    match state.locator.lookup_nearby(&coordinates).await {
        Ok(records) => success(records, &coordinates),
        Err(e) => {
            tracing::error!(error = %e, "Error in nearby PSAP lookup");
            failure(error_status(&e), e.to_string())
        }
    }
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected.as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}
