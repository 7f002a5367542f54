//! Health check HTTP handler.

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::web::AppState;
use crate::web::responses::ok;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// Basic application health including database connectivity.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.database.connection.ping().await {
        Ok(()) => "connected",
        Err(_) => "unreachable",
    };

    ok(HealthResponse {
        status: if database == "connected" {
            "healthy"
        } else {
            "degraded"
        },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}
