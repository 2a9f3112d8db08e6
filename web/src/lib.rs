//! HTTP and WebSocket surface of the backbone.
//!
//! Routes are thin: they resolve the caller, hand off to `realtime` or `domain` and map
//! errors onto status codes. Everything the handlers share lives in [`AppState`].

use axum::http::{header, HeaderValue, Method};
use domain::chat::ChatRelay;
use domain::jwt::TokenResolver;
use domain::stream_catalog::StreamCatalog;
use domain::stream_session::SessionBroker;
use log::*;
use realtime::bridge::Bridge;
use realtime::Manager;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use error::{Error, Result};

mod controller;
mod error;
mod extractors;
mod params;
mod protect;
pub mod router;
mod ws;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub realtime: Arc<Manager>,
    pub bridge: Option<Arc<Bridge>>,
    pub catalog: Arc<dyn StreamCatalog>,
    pub sessions: Arc<SessionBroker>,
    pub chat: Arc<ChatRelay>,
    pub tokens: Option<Arc<TokenResolver>>,
}

impl AppState {
    pub fn new(
        service_state: service::AppState,
        realtime: Arc<Manager>,
        catalog: Arc<dyn StreamCatalog>,
        sessions: Arc<SessionBroker>,
        chat: Arc<ChatRelay>,
    ) -> Self {
        let tokens = service_state
            .config
            .jwt_secret()
            .map(|secret| Arc::new(TokenResolver::new(&secret)));

        Self {
            service_state,
            realtime,
            bridge: None,
            catalog,
            sessions,
            chat,
            tokens,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<Bridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }
}

pub async fn init_server(
    app_state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let config = app_state.config().clone();
    let interface = config.interface.clone().unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{}:{}", interface, config.port);

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin {origin}");
                        None
                    }
                })
                .collect::<Vec<_>>(),
        );

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    let app = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
