use serde::{Deserialize, Serialize};

/// One recognized play, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub event_id: String,
    pub station: String,
    pub artist: String,
    pub title: String,
    pub track_uri: Option<String>,
    /// Unix seconds, UTC.
    pub played_at: i64,
}

impl PlayRecord {
    pub fn cursor(&self) -> PlayCursor {
        PlayCursor {
            played_at: self.played_at,
            event_id: self.event_id.clone(),
        }
    }
}

/// Keyset position for newest-first paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCursor {
    pub played_at: i64,
    pub event_id: String,
}

/// Row filter shared by every history query. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayFilter {
    pub station: Option<String>,
    /// Inclusive lower bound, unix seconds.
    pub since: Option<i64>,
    /// Case-insensitive artist match.
    pub artist: Option<String>,
}

impl PlayFilter {
    pub fn station(station: impl Into<String>) -> Self {
        Self {
            station: Some(station.into()),
            ..Self::default()
        }
    }

    pub fn with_since(mut self, since: Option<i64>) -> Self {
        self.since = since;
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}
