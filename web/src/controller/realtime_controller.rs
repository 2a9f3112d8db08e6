use crate::extractors::caller::Caller;
use crate::params::connect::ConnectParams;
use crate::ws::handler::run_connection;
use crate::ws::sink::WsSink;
use crate::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use log::*;
use realtime::bridge::BridgeStats;
use realtime::ManagerStats;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RealtimeStats {
    pub(crate) manager: ManagerStats,
    /// Absent when no broker is configured.
    pub(crate) bridge: Option<BridgeStats>,
}

/// GET upgrade to a push connection
///
/// Frames are `{"type","timestamp","payload"}` JSON. The first frame is `welcome`,
/// carrying the connection id and the clearance the connection was registered at.
#[utoipa::path(
    get,
    path = "/ws/realtime",
    params(ConnectParams),
    responses(
        (status = 101, description = "Switching protocols to a WebSocket push connection"),
        (status = 400, description = "Not a WebSocket upgrade request")
    ),
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn connect(
    caller: Caller,
    State(app_state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let (user_id, access_level) = caller.push_identity(params.access.as_deref());
    debug!("Upgrading push connection for {user_id} at {access_level}");

    let manager = app_state.realtime.clone();
    let read_idle_timeout = app_state.config().read_idle_timeout();

    ws.on_upgrade(move |socket| async move {
        let (sink, incoming) = socket.split();
        run_connection(
            incoming,
            WsSink::new(sink),
            manager,
            user_id,
            access_level,
            read_idle_timeout,
        )
        .await;
    })
}

/// GET dispatcher and broker bridge counters
#[utoipa::path(
    get,
    path = "/realtime/stats",
    responses(
        (status = 200, description = "Current push connection and bridge statistics", body = RealtimeStats)
    )
)]
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(RealtimeStats {
        manager: app_state.realtime.stats(),
        bridge: app_state.bridge.as_ref().map(|bridge| bridge.stats()),
    })
}
