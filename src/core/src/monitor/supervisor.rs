use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use radiomon_protocol::MonitorState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::station::{Clock, StationMonitor};
use super::status::StatusRegistry;
use crate::analytics::AnalyticsService;
use crate::capture::AudioSampler;
use crate::config::{MonitorConfig, StationConfig};
use crate::error::{ConfigError, StartupError};
use crate::history::HistoryStore;
use crate::playlist::{PlaylistProvider, ProviderKind};
use crate::recognition::Recognizer;

/// External services shared by all station monitors.
#[derive(Clone)]
pub struct Collaborators {
    pub sampler: Arc<dyn AudioSampler>,
    pub recognizer: Arc<dyn Recognizer>,
    providers: HashMap<ProviderKind, Arc<dyn PlaylistProvider>>,
}

impl Collaborators {
    pub fn new(sampler: Arc<dyn AudioSampler>, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            sampler,
            recognizer,
            providers: HashMap::new(),
        }
    }

    /// Register a playlist provider under its own kind.
    pub fn with_provider(mut self, provider: Arc<dyn PlaylistProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<Arc<dyn PlaylistProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn PlaylistProvider>> {
        self.providers.values()
    }

    fn check(&self, stations: &[StationConfig]) -> Result<(), ConfigError> {
        for station in stations {
            for target in &station.targets {
                if !self.providers.contains_key(&target.provider) {
                    return Err(ConfigError::MissingCredentials {
                        station: station.name.clone(),
                        provider: target.provider.as_str(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Owns every station monitor task and the analytics service.
pub struct MonitorSupervisor {
    status: StatusRegistry,
    stop: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
    analytics: Option<AnalyticsService>,
}

impl MonitorSupervisor {
    /// Start one task per station.
    ///
    /// Analytics (history store and dashboard) is only constructed when at
    /// least one station enables it.
    pub async fn start(
        config: MonitorConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StartupError> {
        collaborators.check(&config.stations)?;

        let status = StatusRegistry::new();
        let analytics = if config.analytics_enabled() {
            let names = config
                .stations
                .iter()
                .filter(|s| s.analytics.is_some())
                .map(|s| s.name.clone())
                .collect();
            Some(AnalyticsService::start(&config.analytics, status.clone(), names).await?)
        } else {
            tracing::info!("no station has analytics enabled; history store not started");
            None
        };
        let history = analytics.as_ref().map(|a| a.history().clone());

        let mut monitors = Vec::with_capacity(config.stations.len());
        for station in config.stations {
            status.register(&station.name);
            let build = MonitorBuilder {
                config: station,
                collaborators: collaborators.clone(),
                history: history.clone(),
                clock: clock.clone(),
                status: status.clone(),
            };
            match build.monitor() {
                Ok(monitor) => monitors.push((monitor, build)),
                Err(err) => {
                    if let Some(analytics) = analytics {
                        analytics.shutdown().await;
                    }
                    return Err(err.into());
                }
            }
        }

        let (stop, stop_rx) = watch::channel(false);
        let tasks = monitors
            .into_iter()
            .map(|(monitor, build)| {
                let name = build.config.name.clone();
                (name, spawn_station(monitor, build, stop_rx.clone()))
            })
            .collect::<Vec<_>>();
        tracing::info!(stations = tasks.len(), "monitors started");

        Ok(Self {
            status,
            stop,
            tasks,
            analytics,
        })
    }

    pub fn status(&self) -> &StatusRegistry {
        &self.status
    }

    pub fn history(&self) -> Option<&HistoryStore> {
        self.analytics.as_ref().map(AnalyticsService::history)
    }

    pub fn analytics_running(&self) -> bool {
        self.analytics.is_some()
    }

    pub fn dashboard_addr(&self) -> Option<SocketAddr> {
        self.analytics.as_ref().and_then(AnalyticsService::dashboard_addr)
    }

    /// Signal every monitor to stop, wait for all of them, then stop analytics.
    pub async fn shutdown(self) {
        tracing::info!("stopping monitors");
        self.stop.send_replace(true);
        for (station, task) in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(station = %station, error = %err, "station supervisor task failed");
            }
        }
        if let Some(analytics) = self.analytics {
            analytics.shutdown().await;
        }
        tracing::info!("all monitors stopped");
    }
}

/// Everything needed to construct a station's monitor again after a crash.
struct MonitorBuilder {
    config: StationConfig,
    collaborators: Collaborators,
    history: Option<HistoryStore>,
    clock: Arc<dyn Clock>,
    status: StatusRegistry,
}

impl MonitorBuilder {
    fn monitor(&self) -> Result<StationMonitor, ConfigError> {
        StationMonitor::new(
            self.config.clone(),
            &self.collaborators,
            self.history.clone(),
            self.clock.clone(),
            self.status.handle(&self.config.name),
        )
    }
}

/// Run `monitor` in its own span.
///
/// A panic marks only this station as errored; a fresh monitor is started
/// after one poll interval unless stop arrives first.
fn spawn_station(
    monitor: StationMonitor,
    build: MonitorBuilder,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let name = build.config.name.clone();
    let handle = build.status.handle(&name);
    tokio::spawn(async move {
        let mut monitor = monitor;
        loop {
            let span = tracing::info_span!("station", station = %name);
            let inner = tokio::spawn(monitor.run(stop.clone()).instrument(span));
            let err = match inner.await {
                Ok(()) => return,
                Err(err) => err,
            };
            tracing::error!(station = %name, error = %err, "station monitor crashed");
            handle.update(|status| {
                status.state = MonitorState::Errored;
                status.error_count += 1;
                status.last_error = Some(format!("monitor crashed: {err}"));
            });

            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(build.config.poll_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }

            monitor = match build.monitor() {
                Ok(monitor) => monitor,
                Err(err) => {
                    tracing::error!(station = %name, error = %err, "monitor rebuild failed");
                    handle.update(|status| status.last_error = Some(err.to_string()));
                    break;
                }
            };
            tracing::info!(station = %name, "restarting station monitor");
        }
        handle.set_state(MonitorState::Stopped);
    })
}
