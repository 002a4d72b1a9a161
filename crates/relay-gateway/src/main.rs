//! Classroom relay gateway.
//!
//! - WebSocket endpoint: /ws?code=...
//! - Decode-once pipeline: WS Message -> RawFrame -> dispatcher (C6) -> handler (C7)
//! - Background sweeps: classroom-code expiry (C3), session lifecycle (C9),
//!   connection health (C5), active-count cache refresh (C10)

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_gateway::app_state::AppState;
use relay_gateway::config::GatewayConfig;
use relay_gateway::dispatch::Dispatcher;
use relay_gateway::handlers;
use relay_gateway::router;
use relay_gateway::store::Store;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = GatewayConfig::from_env().expect("config load failed");
    let listen = cfg.listen_addr();

    let store = Store::connect(&cfg.database_url).await.expect("database connect failed");
    store.migrate().await.expect("database migration failed");

    let dispatcher = Dispatcher::new();
    handlers::register_all(&dispatcher);

    let state = AppState::new(cfg, store, dispatcher);
    spawn_background_sweeps(state.clone());

    let app = router::build_router(state.clone());

    tracing::info!(%listen, "relay-gateway starting");
    let listener = tokio::net::TcpListener::bind(&listen).await.expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server failed");
}

fn spawn_background_sweeps(state: AppState) {
    let directory_state = state.clone();
    let directory_interval = directory_state.cfg().classroom_code_cleanup_interval;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(directory_interval);
        loop {
            tick.tick().await;
            let evicted = directory_state.directory().sweep_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "swept expired classroom codes");
            }
        }
    });

    let lifecycle_state = state.clone();
    let lifecycle_interval = lifecycle_state.cfg().session_cleanup_interval;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(lifecycle_interval);
        loop {
            tick.tick().await;
            match lifecycle_state.lifecycle().sweep().await {
                Ok((empty_teacher, abandoned, long_inactive)) => {
                    if empty_teacher + abandoned + long_inactive > 0 {
                        tracing::info!(empty_teacher, abandoned, long_inactive, "session lifecycle sweep ended sessions");
                    }
                }
                Err(error) => tracing::warn!(%error, "session lifecycle sweep failed"),
            }
        }
    });

    let health_state = state.clone();
    let health_interval = health_state.cfg().health_check_interval;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(health_interval);
        loop {
            tick.tick().await;
            let stale = health_state.health().sweep(health_state.registry(), health_interval * 3);
            for connection_id in stale {
                if let Some(handle) = health_state.registry().unregister(connection_id) {
                    health_state.health().forget(connection_id);
                    health_state.metrics().ws_active_connections.dec(&[]);
                    tracing::debug!(%connection_id, session_id = %handle.session_id, "dropped unresponsive connection");
                }
            }
        }
    });

    let active_count_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tick.tick().await;
            if let Err(error) = active_count_state.active_count().refresh(active_count_state.store()).await {
                tracing::warn!(%error, "active-count refresh failed");
            }
        }
    });
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    state.set_draining();
    tracing::info!("signal received, starting graceful shutdown");
}
