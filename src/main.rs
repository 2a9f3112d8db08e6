use domain::chat::{ChatRelay, DbChatStore};
use domain::session_store::DbSessionStore;
use domain::stream_catalog::DbStreamCatalog;
use domain::stream_session::{SessionBroker, SessionBrokerConfig};
use events::EventPublisher;
use log::*;
use realtime::bridge::{Bridge, ReconnectPolicy, RedisBroker, RouteTable};
use realtime::{Manager, ManagerConfig, RealtimeEventHandler};
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Starting up realtime backbone [{:?}]...", config.runtime_env());

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let manager = Arc::new(Manager::new(ManagerConfig {
        outbound_queue_size: config.outbound_queue_size,
        ping_period: config.ping_period(),
        pong_timeout: config.pong_timeout(),
        write_timeout: config.write_timeout(),
    }));

    let publisher =
        EventPublisher::new().with_handler(Arc::new(RealtimeEventHandler::new(manager.clone())));
    let catalog = Arc::new(DbStreamCatalog::new(db.clone()));

    let sessions = Arc::new(SessionBroker::new(
        catalog.clone(),
        Arc::new(DbSessionStore::new(db.clone())),
        SessionBrokerConfig::from_config(&config),
    ));
    let chat = Arc::new(
        ChatRelay::new(catalog.clone(), publisher).with_store(Arc::new(DbChatStore::new(db.clone()))),
    );

    let bridge = config.broker_url().map(|url| {
        let broker = match RedisBroker::open(url) {
            Ok(broker) => Arc::new(broker),
            Err(e) => {
                error!("Invalid broker URL: {e}");
                std::process::exit(1);
            }
        };
        Arc::new(Bridge::new(
            broker,
            manager.clone(),
            RouteTable::platform_defaults(),
            ReconnectPolicy::new(config.broker_reconnect_wait(), config.broker_max_reconnects),
        ))
    });

    if let Some(bridge) = &bridge {
        if let Err(e) = bridge.start() {
            error!("Failed to start broker bridge: {e}");
            std::process::exit(1);
        }
    } else {
        info!("No broker URL configured, running without the broker bridge");
    }

    let purge_task = tokio::spawn(purge_expired_sessions(
        sessions.clone(),
        config.session_purge_interval(),
    ));

    let service_state = service::AppState::new(config, &db);
    let mut app_state = web::AppState::new(service_state, manager.clone(), catalog, sessions, chat);
    if let Some(bridge) = &bridge {
        app_state = app_state.with_bridge(bridge.clone());
    }

    if let Err(e) = web::init_server(app_state, shutdown_signal()).await {
        error!("Server exited with error: {e}");
    }

    info!("Shutting down...");
    purge_task.abort();
    if let Some(bridge) = bridge {
        bridge.stop().await;
    }
    manager.stop();
}

async fn purge_expired_sessions(sessions: Arc<SessionBroker>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = sessions.purge_expired().await {
            warn!("Failed to purge expired stream sessions: {e}");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
