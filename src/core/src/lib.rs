mod analytics;
pub mod capture;
mod config;
mod error;
pub mod history;
pub mod monitor;
mod paths;
pub mod playlist;
mod radiomon_config;
pub mod recognition;
pub mod schedule;
mod server;
pub mod storage;

pub use analytics::AnalyticsService;
pub use capture::{AudioSampler, FfmpegSampler};
pub use config::{
    default_dashboard_addr, AnalyticsPolicy, AnalyticsSettings, HistoryLocation, MonitorConfig,
    StationConfig, DEFAULT_PLAYLIST_MAX_SIZE, DEFAULT_POLL_INTERVAL, DEFAULT_RETENTION_DAYS,
    DEFAULT_SAMPLE_DURATION,
};
pub use error::{ConfigError, MonitorError, StartupError};
pub use history::{HistoryStore, PlayEvent, PlayHistory};
pub use monitor::{
    Clock, Collaborators, CycleOutcome, MonitorSupervisor, StationMonitor, StatusRegistry,
    SystemClock,
};
pub use paths::{radiomon_config_path, radiomon_home_dir, resolve_path};
pub use playlist::{
    PlaylistEntry, PlaylistMode, PlaylistProvider, PlaylistState, PlaylistTarget, ProviderKind,
    SpotifyProvider, YouTubeProvider,
};
pub use radiomon_config::{RadiomonConfig, SpotifyConfig, StationEntry, YouTubeConfig};
pub use recognition::{AuddRecognizer, Recognition, Recognizer};
pub use schedule::SkipSchedule;
pub use server::build_router;
pub use storage::{SqliteStore, Store};
