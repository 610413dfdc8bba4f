use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. No authentication: a connection becomes a
/// user only once it announces an identity.
/// Browsers always send Origin on upgrades, so a foreign Origin is refused
/// here; clients that send none (native tools, tests) are let through.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let (Some(allowed), Some(origin)) = (&state.allowed_origin, headers.get(header::ORIGIN)) {
        if origin != allowed {
            tracing::warn!(origin = ?origin, "WebSocket upgrade from disallowed origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
