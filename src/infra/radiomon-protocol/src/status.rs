use serde::{Deserialize, Serialize};

/// Lifecycle state of one station monitor.
///
/// A monitor cycles `idle → sampling → evaluating → writing → idle`.
/// `skipping` replaces sampling while a skip window is active, `errored`
/// marks a cycle that failed on a collaborator, and `stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Sampling,
    Evaluating,
    Writing,
    Skipping,
    Errored,
    Stopped,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Evaluating => "evaluating",
            Self::Writing => "writing",
            Self::Skipping => "skipping",
            Self::Errored => "errored",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Most recent positive recognition for a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMatch {
    pub artist: String,
    pub title: String,
    /// Unix seconds.
    pub matched_at: i64,
}

/// Snapshot of a station monitor, served to dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStatus {
    pub station: String,
    pub state: MonitorState,
    /// Unix seconds of the last finished cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_match: Option<LastMatch>,
    pub cycles: u64,
    pub error_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub in_skip_window: bool,
}

impl StationStatus {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            state: MonitorState::Idle,
            last_cycle_at: None,
            last_match: None,
            cycles: 0,
            error_count: 0,
            last_error: None,
            in_skip_window: false,
        }
    }
}
