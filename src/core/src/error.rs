use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, reported before any station starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Path(String),

    #[error("no stations defined")]
    NoStations,

    #[error("duplicate station name: {0}")]
    DuplicateStation(String),

    #[error("station {station}: {reason}")]
    InvalidStation { station: String, reason: String },

    #[error("invalid skip window {entry:?}: {reason}")]
    InvalidSkipWindow { entry: String, reason: String },

    #[error("invalid playlist mode {0:?} (expected \"normal\" or \"reverse\")")]
    InvalidPlaylistMode(String),

    #[error("station {station} targets {provider} but no {provider} credentials are configured")]
    MissingCredentials {
        station: String,
        provider: &'static str,
    },
}

/// Recoverable failure inside one station cycle.
///
/// Never escapes the station that produced it; the monitor logs it, bumps its
/// error counter and tries again on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("{provider} playlist {playlist_id}: {message}")]
    Provider {
        provider: &'static str,
        playlist_id: String,
        message: String,
    },

    #[error("history storage: {0}")]
    Storage(String),
}

impl MonitorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Capture(_) => "capture",
            Self::Recognition(_) => "recognition",
            Self::Provider { .. } => "provider",
            Self::Storage(_) => "storage",
        }
    }
}

/// Errors that abort supervisor startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("open analytics store: {0}")]
    Storage(String),

    #[error("bind dashboard on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("verify {provider} account: {message}")]
    Verify {
        provider: &'static str,
        message: String,
    },
}
