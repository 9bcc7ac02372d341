//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness: are both provider sessions configured?

use crate::{providers::session::Session, services::migration_service::MigrationService};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;

/// `GET /healthz`
///
/// Always 200 OK. Performs no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Reports whether each provider session was built from valid configuration.
/// Providers are not contacted; a configured but unreachable provider still
/// reads as ready and fails on first use instead.
///
/// HTTP 200 when both sessions are ready, HTTP 503 otherwise.
pub async fn readyz(State(service): State<MigrationService>) -> impl IntoResponse {
    let sessions = service.sessions();

    let mut checks = BTreeMap::new();
    checks.insert("source", check(&sessions.source));
    checks.insert("destination", check(&sessions.destination));
    let overall_ok = checks.values().all(|c| c.ok);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

fn check<T>(session: &Session<T>) -> CheckStatus {
    let error = match session {
        Session::Ready(_) => None,
        Session::Unconfigured(reason) => Some(reason.clone()),
    };
    CheckStatus {
        ok: session.is_ready(),
        error,
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
