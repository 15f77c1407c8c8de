use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::playlist::{PlaylistMode, PlaylistTarget};
use crate::schedule::SkipSchedule;

pub const DEFAULT_SAMPLE_DURATION: Duration = Duration::from_secs(12);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_PLAYLIST_MAX_SIZE: usize = 100;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Play-history settings of one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsPolicy {
    /// Plays older than this many days are pruned after every insert.
    pub retention_days: u32,
}

impl Default for AnalyticsPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Validated configuration of one monitored station.
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub name: String,
    pub stream_url: String,
    pub targets: Vec<PlaylistTarget>,
    pub skip: SkipSchedule,
    /// Length of each captured audio sample.
    pub sample_duration: Duration,
    /// Time between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Playlist length limit; 0 means unbounded.
    pub playlist_max_size: usize,
    pub playlist_mode: PlaylistMode,
    pub analytics: Option<AnalyticsPolicy>,
}

impl StationConfig {
    pub fn new(name: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_url: stream_url.into(),
            targets: Vec::new(),
            skip: SkipSchedule::default(),
            sample_duration: DEFAULT_SAMPLE_DURATION,
            poll_interval: DEFAULT_POLL_INTERVAL,
            playlist_max_size: DEFAULT_PLAYLIST_MAX_SIZE,
            playlist_mode: PlaylistMode::Normal,
            analytics: None,
        }
    }
}

/// Where play history lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLocation {
    File(PathBuf),
    Memory,
}

/// Analytics service settings, shared by all stations.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub location: HistoryLocation,
    /// Dashboard bind address; `None` keeps the dashboard off.
    pub dashboard: Option<SocketAddr>,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            location: HistoryLocation::Memory,
            dashboard: None,
        }
    }
}

/// Everything the supervisor needs to start.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub stations: Vec<StationConfig>,
    pub analytics: AnalyticsSettings,
}

impl MonitorConfig {
    pub fn analytics_enabled(&self) -> bool {
        self.stations.iter().any(|s| s.analytics.is_some())
    }
}

pub fn default_dashboard_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}
