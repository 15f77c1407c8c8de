use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::config::{
    AnalyticsPolicy, AnalyticsSettings, HistoryLocation, MonitorConfig, StationConfig,
    DEFAULT_PLAYLIST_MAX_SIZE, DEFAULT_POLL_INTERVAL, DEFAULT_RETENTION_DAYS,
    DEFAULT_SAMPLE_DURATION,
};
use crate::error::ConfigError;
use crate::paths::{radiomon_config_path, resolve_path};
use crate::playlist::{PlaylistMode, PlaylistTarget, ProviderKind};
use crate::recognition::DEFAULT_AUDD_ENDPOINT;
use crate::schedule::SkipSchedule;

/// On-disk `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadiomonConfig {
    pub version: u32,
    pub defaults: DefaultsConfig,
    pub analytics: AnalyticsConfig,
    pub dashboard: DashboardConfig,
    pub recognizer: RecognizerConfig,
    pub capture: CaptureConfig,
    pub providers: ProvidersConfig,
    pub stations: Vec<StationEntry>,
}

impl Default for RadiomonConfig {
    fn default() -> Self {
        Self {
            version: 1,
            defaults: DefaultsConfig::default(),
            analytics: AnalyticsConfig::default(),
            dashboard: DashboardConfig::default(),
            recognizer: RecognizerConfig::default(),
            capture: CaptureConfig::default(),
            providers: ProvidersConfig::default(),
            stations: Vec::new(),
        }
    }
}

impl RadiomonConfig {
    /// Load from `~/.radiomon/config.toml` (or `$RADIOMON_HOME/config.toml`).
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        radiomon_config_path().map_err(ConfigError::Path)
    }

    /// Validate every station and resolve shared defaults.
    pub fn stations(&self) -> Result<Vec<StationConfig>, ConfigError> {
        if self.stations.is_empty() {
            return Err(ConfigError::NoStations);
        }
        let mut seen = HashSet::new();
        self.stations
            .iter()
            .map(|entry| {
                let station = self.station(entry)?;
                if !seen.insert(station.name.clone()) {
                    return Err(ConfigError::DuplicateStation(station.name));
                }
                Ok(station)
            })
            .collect()
    }

    /// Full supervisor configuration.
    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        Ok(MonitorConfig {
            stations: self.stations()?,
            analytics: AnalyticsSettings {
                location: HistoryLocation::File(self.analytics_db_path()?),
                dashboard: self.dashboard_addr()?,
            },
        })
    }

    pub fn analytics_db_path(&self) -> Result<PathBuf, ConfigError> {
        resolve_path(&self.analytics.db_path).map_err(ConfigError::Path)
    }

    /// Dashboard bind address, `None` when the dashboard is disabled.
    pub fn dashboard_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        if !self.dashboard.enabled {
            return Ok(None);
        }
        let ip: IpAddr = self.dashboard.host.trim().parse().map_err(|e| {
            ConfigError::Path(format!("dashboard host {:?}: {e}", self.dashboard.host))
        })?;
        Ok(Some(SocketAddr::new(ip, self.dashboard.port)))
    }

    fn station(&self, entry: &StationEntry) -> Result<StationConfig, ConfigError> {
        let name = entry.name.trim().to_string();
        let invalid = |reason: &str| ConfigError::InvalidStation {
            station: if name.is_empty() { "<unnamed>".to_string() } else { name.clone() },
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if entry.stream_url.trim().is_empty() {
            return Err(invalid("stream_url is empty"));
        }

        let defaults = &self.defaults;
        let sample_secs = entry.sample_duration_secs.unwrap_or(defaults.sample_duration_secs);
        let poll_secs = entry.poll_interval_secs.unwrap_or(defaults.poll_interval_secs);
        if sample_secs == 0 {
            return Err(invalid("sample_duration_secs must be positive"));
        }
        if poll_secs == 0 {
            return Err(invalid("poll_interval_secs must be positive"));
        }
        let playlist_mode: PlaylistMode = entry
            .playlist_mode
            .as_deref()
            .unwrap_or(defaults.playlist_mode.as_str())
            .parse()?;

        let mut targets = Vec::new();
        if let Some(id) = non_empty(&entry.spotify_playlist_id) {
            if !self.providers.spotify.is_configured() {
                return Err(ConfigError::MissingCredentials {
                    station: name.clone(),
                    provider: ProviderKind::Spotify.as_str(),
                });
            }
            targets.push(PlaylistTarget {
                provider: ProviderKind::Spotify,
                playlist_id: id.to_string(),
            });
        }
        if let Some(id) = non_empty(&entry.youtube_playlist_id) {
            if !self.providers.youtube.is_configured() {
                return Err(ConfigError::MissingCredentials {
                    station: name.clone(),
                    provider: ProviderKind::Youtube.as_str(),
                });
            }
            targets.push(PlaylistTarget {
                provider: ProviderKind::Youtube,
                playlist_id: id.to_string(),
            });
        }

        let analytics = entry.analytics.then(|| AnalyticsPolicy {
            retention_days: entry
                .retention_days
                .unwrap_or(self.analytics.retention_days),
        });
        if targets.is_empty() && analytics.is_none() {
            return Err(invalid("no playlist target and analytics disabled"));
        }

        Ok(StationConfig {
            skip: SkipSchedule::parse(&entry.skip_hours)?,
            stream_url: entry.stream_url.trim().to_string(),
            targets,
            sample_duration: Duration::from_secs(sample_secs),
            poll_interval: Duration::from_secs(poll_secs),
            playlist_max_size: entry
                .playlist_max_size
                .unwrap_or(defaults.playlist_max_size),
            playlist_mode,
            analytics,
            name,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Values stations inherit unless they override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub sample_duration_secs: u64,
    pub poll_interval_secs: u64,
    pub playlist_max_size: usize,
    pub playlist_mode: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            sample_duration_secs: DEFAULT_SAMPLE_DURATION.as_secs(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            playlist_max_size: DEFAULT_PLAYLIST_MAX_SIZE,
            playlist_mode: PlaylistMode::Normal.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Relative paths resolve against the radiomon home.
    pub db_path: String,
    pub retention_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            db_path: "analytics.db".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub endpoint: String,
    pub api_token: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_AUDD_ENDPOINT.to_string(),
            api_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub ffmpeg_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub spotify: SpotifyConfig,
    pub youtube: YouTubeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// ISO 3166-1 market for search results.
    pub market: Option<String>,
    pub api_base: String,
    pub token_url: String,
}

impl SpotifyConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            market: None,
            api_base: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base: String,
    pub token_url: String,
}

impl YouTubeConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// One `[[stations]]` table. Unset overrides inherit `[defaults]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StationEntry {
    pub name: String,
    pub stream_url: String,
    pub spotify_playlist_id: Option<String>,
    pub youtube_playlist_id: Option<String>,
    /// Comma-separated skip windows, e.g. `"weekdays 02:00-06:00"`.
    pub skip_hours: String,
    pub sample_duration_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub playlist_max_size: Option<usize>,
    pub playlist_mode: Option<String>,
    pub analytics: bool,
    pub retention_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [defaults]
        poll_interval_secs = 120

        [providers.spotify]
        client_id = "id"
        client_secret = "secret"
        refresh_token = "refresh"

        [[stations]]
        name = "alpha"
        stream_url = "http://example.test/alpha"
        spotify_playlist_id = "pl-alpha"
        skip_hours = "weekdays 02:00-06:00"

        [[stations]]
        name = "beta"
        stream_url = "http://example.test/beta"
        analytics = true
        retention_days = 7
        playlist_mode = "reverse"
        playlist_max_size = 0
    "#;

    #[test]
    fn defaults_apply_and_overrides_win() {
        let config = RadiomonConfig::from_toml(SAMPLE).unwrap();
        let stations = config.stations().unwrap();
        assert_eq!(stations.len(), 2);

        let alpha = &stations[0];
        assert_eq!(alpha.sample_duration, Duration::from_secs(12));
        assert_eq!(alpha.poll_interval, Duration::from_secs(120));
        assert_eq!(alpha.playlist_max_size, 100);
        assert_eq!(alpha.playlist_mode, PlaylistMode::Normal);
        assert_eq!(alpha.targets.len(), 1);
        assert_eq!(alpha.skip.windows().len(), 1);
        assert!(alpha.analytics.is_none());

        let beta = &stations[1];
        assert_eq!(beta.playlist_mode, PlaylistMode::Reverse);
        assert_eq!(beta.playlist_max_size, 0);
        assert_eq!(beta.analytics, Some(AnalyticsPolicy { retention_days: 7 }));
    }

    #[test]
    fn empty_file_uses_defaults_but_has_no_stations() {
        let config = RadiomonConfig::from_toml("").unwrap();
        assert_eq!(config.analytics.retention_days, 30);
        assert!(!config.dashboard.enabled);
        assert_eq!(config.dashboard.port, 8080);
        assert!(matches!(config.stations(), Err(ConfigError::NoStations)));
    }

    #[test]
    fn duplicate_station_names_are_rejected() {
        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
            analytics = true
            [[stations]]
            name = "a"
            stream_url = "http://y"
            analytics = true
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStation(name) if name == "a"));
    }

    #[test]
    fn playlist_without_credentials_is_rejected() {
        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
            youtube_playlist_id = "PL1"
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials { provider: "youtube", .. }));
    }

    #[test]
    fn station_that_does_nothing_is_rejected() {
        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStation { .. }));
    }

    #[test]
    fn bad_skip_window_and_mode_are_rejected() {
        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
            analytics = true
            skip_hours = "25:00-26:00"
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSkipWindow { .. }));

        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
            analytics = true
            playlist_mode = "shuffle"
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlaylistMode(_)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let raw = r#"
            [[stations]]
            name = "a"
            stream_url = "http://x"
            analytics = true
            poll_interval_secs = 0
        "#;
        let err = RadiomonConfig::from_toml(raw).unwrap().stations().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStation { .. }));
    }

    #[test]
    fn dashboard_addr_only_when_enabled() {
        let mut config = RadiomonConfig::default();
        assert_eq!(config.dashboard_addr().unwrap(), None);
        config.dashboard.enabled = true;
        config.dashboard.port = 9090;
        assert_eq!(
            config.dashboard_addr().unwrap(),
            Some("127.0.0.1:9090".parse().unwrap())
        );
    }
}
