//! Arranjo Back binary entrypoint wiring the room store, theme catalog, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arranjo_back::{
    catalog::ThemeCatalog,
    config::{AppConfig, StoreKind},
    dao::{
        room_store::{RoomStore, memory::MemoryRoomStore},
        storage::StorageError,
    },
    routes,
    services::{janitor, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let catalog = ThemeCatalog::load(config.themes_source()).await;
    let store_kind = config.store();

    let app_state = AppState::new(config, catalog);

    spawn_storage_supervisor(app_state.clone(), store_kind);
    tokio::spawn(janitor::run(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = routes::app(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the configured backend; it toggles degraded mode as
/// connectivity changes.
fn spawn_storage_supervisor(state: SharedState, kind: StoreKind) {
    match kind {
        StoreKind::Memory => {
            info!("using in-memory room store");
            let store = MemoryRoomStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                memory_store(store.clone())
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreKind::Couch => {
            info!("using CouchDB room store");
            tokio::spawn(storage_supervisor::run(state, couch_store));
        }
        #[cfg(not(feature = "couch-store"))]
        StoreKind::Couch => {
            warn!("CouchDB support not compiled in; falling back to the in-memory room store");
            spawn_storage_supervisor(state, StoreKind::Memory);
        }
    }
}

fn memory_store(store: MemoryRoomStore) -> BoxFuture<'static, Result<Arc<dyn RoomStore>, StorageError>> {
    async move { Ok(Arc::new(store) as Arc<dyn RoomStore>) }.boxed()
}

#[cfg(feature = "couch-store")]
fn couch_store() -> BoxFuture<'static, Result<Arc<dyn RoomStore>, StorageError>> {
    use arranjo_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

    async {
        let config = CouchConfig::from_env()?;
        let store = CouchRoomStore::connect(config).await?;
        Ok(Arc::new(store) as Arc<dyn RoomStore>)
    }
    .boxed()
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
