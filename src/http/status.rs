//! Landing page and liveness probe.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::{AppState, SOAP_PATH};

#[derive(Debug, Serialize)]
struct Health<'a> {
    status: &'static str,
    target: &'a str,
}

/// Reports liveness only. The upstream is not contacted.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    Json(Health {
        status: "healthy",
        target: &state.config.upstream.url,
    })
    .into_response()
}

pub async fn landing_handler(State(state): State<AppState>) -> Response {
    let body = format!(
        "{} is running\nPOST SOAP requests to {SOAP_PATH} endpoint\nTarget: {}\n",
        env!("CARGO_PKG_NAME"),
        state.config.upstream.url,
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
