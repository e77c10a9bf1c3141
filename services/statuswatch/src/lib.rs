//! Statuswatch - server availability monitoring and auto-reload service
//!
//! Polls an origin's readiness endpoint, tracks UP/DOWN transitions, and
//! drives an overlay surface with an optional reload action on recovery.

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod io;
pub mod monitor;
pub mod readiness;
pub mod reload;
pub mod settings;
pub mod state;
pub mod webhook;

pub use config::{load_config, Config};
pub use error::{Result, WatchError};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dashboard::DashboardState;
use crate::engine::Engine;
use crate::io::ReqwestHttpClient;
use crate::readiness::ReadinessProbe;
use crate::reload::{Reloader, TraceReloader};
use crate::settings::SettingsStore;
use crate::webhook::WebhookReloader;

/// Run the statuswatch service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::default());
    let cancel = CancellationToken::new();

    let spec = config.monitor.resolve()?;

    let settings = SettingsStore::load(config.settings_path.as_deref())?;

    let reloader: Arc<dyn Reloader> = match &config.reload {
        Some(reload_config) => Arc::new(WebhookReloader::new(reload_config, Arc::clone(&http))),
        None => Arc::new(TraceReloader),
    };

    let state = state::new_state_handle(spec.origin.clone(), config.dashboard.history_size);

    let engine = Engine::new(
        Arc::new(ReadinessProbe::new(&spec.origin, Arc::clone(&http))),
        Arc::clone(&reloader),
        spec.clone(),
        settings.subscribe(),
        Arc::clone(&state),
        cancel.clone(),
    );

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Start dashboard if enabled
    if config.dashboard.enabled {
        let dashboard_port = config.dashboard.port;
        let dashboard_state = DashboardState {
            state: Arc::clone(&state),
            settings: settings.clone(),
            reloader: Arc::clone(&reloader),
            reload_target: spec.reload_target.clone(),
            kind: spec.kind,
        };
        let cancel_for_dashboard = cancel.clone();

        tokio::spawn(async move {
            let router = dashboard::build_router(dashboard_state);
            let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
            tracing::info!("Dashboard listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                        dashboard_port,
                        e
                    );
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_dashboard.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Dashboard stopped");
        });
    }

    tracing::info!("Availability monitor started for {}", spec.origin);

    // Run the engine (blocks until cancelled)
    engine.run().await;

    tracing::info!("Availability monitor stopped");

    Ok(())
}
