//! Webhook HTTP surface
//!
//! | Route      | Method | Response |
//! |------------|--------|----------|
//! | `/webhook` | POST   | 200 once the event is dispatched, 400 with a reason otherwise |
//! | `/healthz` | GET    | `OK` |
//! | `/ready`   | GET    | `READY` |
//!
//! Any other method on `/webhook` gets 405, and events arriving while the
//! daemon drains get 503. The 200 only means the event was accepted: DNS
//! updates run afterwards and their outcome is logged.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use dnshook_core::{Error, Orchestrator, WebhookPayload};
use tracing::{debug, warn};

/// Body returned for an accepted webhook
pub const ACCEPTED_BODY: &str = "Webhook received and is being processed";

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Build the daemon's router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/healthz", get(healthz_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

async fn webhook_handler(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let event = match WebhookPayload::from_slice(&body).and_then(WebhookPayload::into_event) {
        Ok(event) => event,
        Err(e) => return reject(&e),
    };

    debug!(
        event = %event.kind,
        actor = %event.actor,
        correlation_id = %event.correlation_id,
        "Webhook received"
    );

    match state.orchestrator.dispatch(event) {
        // Tasks run detached; outcomes are reported through logs and HookEvents
        Ok(_dispatch) => (StatusCode::OK, ACCEPTED_BODY),
        Err(e) => reject(&e),
    }
}

/// Map a rejected event to its HTTP status and reason
fn reject(err: &Error) -> (StatusCode, &'static str) {
    let reason = match err {
        Error::Json(_) => "Invalid JSON payload",
        Error::UnsupportedEvent(_) => "Unsupported event type",
        Error::MissingSnapshot(_) => "Snapshots missing in payload",
        Error::Validation(_) => "Invalid payload data",
        Error::ShuttingDown => {
            return (StatusCode::SERVICE_UNAVAILABLE, "Shutting down");
        }
        _ => {
            warn!(error = %err, "Webhook failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    warn!(error = %err, reason, "Webhook rejected");
    (StatusCode::BAD_REQUEST, reason)
}

async fn healthz_handler() -> &'static str {
    "OK"
}

async fn ready_handler() -> &'static str {
    "READY"
}
