use crate::controller::{
    health_check_controller, realtime_controller, stream_chat_controller,
    stream_session_controller,
};
use crate::{params, protect, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Realtime Backbone API"
        ),
        paths(
            health_check_controller::health_check,
            realtime_controller::connect,
            realtime_controller::stats,
            stream_session_controller::create,
            stream_session_controller::revoke,
            stream_chat_controller::index,
            stream_chat_controller::create,
        ),
        components(
            schemas(
                domain::chat::ChatMessage,
                domain::stream_session::IceServer,
                domain::stream_session::SessionDescriptor,
                realtime::ManagerStats,
                realtime::bridge::BridgeStats,
                realtime_controller::RealtimeStats,
                params::stream::ChatParams,
                params::stream::SessionTokenParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "realtime_backbone", description = "Clearance-filtered push, stream sessions and chat")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Bearer tokens are optional everywhere; without one a caller is served at public clearance.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "HMAC-signed JWT carrying user_id, role, subscription_tier and is_government",
                        ))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(realtime_routes(app_state.clone()))
        .merge(stream_session_routes(app_state.clone()))
        .merge(stream_chat_routes(app_state))
        // **** FIXME: protect the OpenAPI web UI
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn realtime_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/realtime", get(realtime_controller::connect))
        .route("/realtime/stats", get(realtime_controller::stats))
        .with_state(app_state)
}

fn stream_session_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(
            // POST /streams/{id}/session
            Router::new()
                .route(
                    "/streams/{id}/session",
                    post(stream_session_controller::create),
                )
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    protect::streams::viewer,
                )),
        )
        .route(
            "/sessions/{session_id}/revoke",
            post(stream_session_controller::revoke),
        )
        .with_state(app_state)
}

fn stream_chat_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/streams/{id}/chat",
            get(stream_chat_controller::index).post(stream_chat_controller::create),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            protect::streams::viewer,
        ))
        .with_state(app_state)
}
