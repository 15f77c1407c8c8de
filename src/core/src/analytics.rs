use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{AnalyticsSettings, HistoryLocation};
use crate::error::StartupError;
use crate::history::HistoryStore;
use crate::monitor::StatusRegistry;
use crate::server::build_router;
use crate::storage::{SqliteStore, Store};

struct DashboardServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Play-history storage plus the optional dashboard server.
pub struct AnalyticsService {
    history: HistoryStore,
    dashboard: Option<DashboardServer>,
}

impl AnalyticsService {
    /// Open the history store and, when configured, bind the dashboard.
    ///
    /// `stations` are the stations with analytics enabled.
    pub async fn start(
        settings: &AnalyticsSettings,
        status: StatusRegistry,
        stations: Vec<String>,
    ) -> Result<Self, StartupError> {
        let store: Arc<dyn Store> = match &settings.location {
            HistoryLocation::File(path) => {
                tracing::info!(path = %path.display(), "opening play history");
                Arc::new(SqliteStore::open(path).map_err(StartupError::Storage)?)
            }
            HistoryLocation::Memory => {
                Arc::new(SqliteStore::open_memory().map_err(StartupError::Storage)?)
            }
        };
        let history = HistoryStore::new(store);

        let dashboard = match settings.dashboard {
            Some(addr) => Some(serve_dashboard(addr, history.clone(), status, stations).await?),
            None => None,
        };

        Ok(Self { history, dashboard })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Bound dashboard address (useful when binding port 0).
    pub fn dashboard_addr(&self) -> Option<SocketAddr> {
        self.dashboard.as_ref().map(|d| d.addr)
    }

    /// Stop the dashboard and wait for in-flight requests.
    pub async fn shutdown(self) {
        if let Some(dashboard) = self.dashboard {
            let _ = dashboard.shutdown.send(());
            if let Err(err) = dashboard.task.await {
                tracing::warn!(error = %err, "dashboard task ended abnormally");
            }
        }
        tracing::info!("analytics stopped");
    }
}

async fn serve_dashboard(
    addr: SocketAddr,
    history: HistoryStore,
    status: StatusRegistry,
    stations: Vec<String>,
) -> Result<DashboardServer, StartupError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    let bound = listener
        .local_addr()
        .map_err(|source| StartupError::Bind { addr, source })?;
    let app = build_router(history, status, stations);
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = serve.await {
            tracing::error!(error = %err, "dashboard server failed");
        }
    });
    tracing::info!(addr = %bound, "dashboard listening");

    Ok(DashboardServer {
        addr: bound,
        shutdown,
        task,
    })
}
