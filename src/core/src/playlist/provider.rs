use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::recognition::Recognition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Spotify,
    Youtube,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::Youtube => "youtube",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One playlist a station writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTarget {
    pub provider: ProviderKind,
    pub playlist_id: String,
}

/// A track as it sits in a provider playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Provider track identity (Spotify URI, YouTube video id).
    pub track_id: String,
    pub inserted_at: DateTime<Utc>,
    /// Provider handle for this particular slot, when the provider has one
    /// (YouTube playlist item id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// Capability interface over a playlist service.
///
/// Every call is a network round trip and may fail; the monitor treats all
/// failures as retryable on its next cycle.
pub trait PlaylistProvider: Send + Sync + 'static {
    fn kind(&self) -> ProviderKind;

    /// Confirm the credentials work. Returns the account display name.
    fn verify(&self) -> BoxFuture<'_, Result<String, String>>;

    /// Map recognized metadata to a provider track id.
    fn search_track<'a>(
        &'a self,
        track: &'a Recognition,
    ) -> BoxFuture<'a, Result<Option<String>, String>>;

    /// Current playlist contents, top first.
    fn list_tracks<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PlaylistEntry>, String>>;

    /// Insert at position 0. Returns the provider item handle, if any.
    fn insert_top<'a>(
        &'a self,
        playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>>;

    /// Append at the end. Returns the provider item handle, if any.
    fn insert_bottom<'a>(
        &'a self,
        playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>>;

    fn remove_top<'a>(
        &'a self,
        playlist_id: &'a str,
        entry: &'a PlaylistEntry,
    ) -> BoxFuture<'a, Result<(), String>>;

    /// Remove the last entry; `position` is its zero-based index.
    fn remove_bottom<'a>(
        &'a self,
        playlist_id: &'a str,
        entry: &'a PlaylistEntry,
        position: usize,
    ) -> BoxFuture<'a, Result<(), String>>;

    /// The entry with the newest insertion time.
    fn most_recent_track<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PlaylistEntry>, String>> {
        Box::pin(async move {
            let entries = self.list_tracks(playlist_id).await?;
            Ok(entries.into_iter().max_by_key(|entry| entry.inserted_at))
        })
    }
}
