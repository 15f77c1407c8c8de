use std::collections::VecDeque;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::{PlaylistEntry, PlaylistProvider};
use crate::error::ConfigError;

/// Re-inserting the most recent track within this many seconds is suppressed.
pub const DUPLICATE_WINDOW_SECS: i64 = 120;

/// Which end of the playlist receives new tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistMode {
    /// Newest first: insert at the top, trim from the bottom.
    #[default]
    Normal,
    /// Oldest first: append at the bottom, trim from the top.
    Reverse,
}

impl PlaylistMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Reverse => "reverse",
        }
    }

    pub fn insert_end(self) -> End {
        match self {
            Self::Normal => End::Top,
            Self::Reverse => End::Bottom,
        }
    }

    pub fn trim_end(self) -> End {
        match self {
            Self::Normal => End::Bottom,
            Self::Reverse => End::Top,
        }
    }
}

impl FromStr for PlaylistMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "reverse" => Ok(Self::Reverse),
            _ => Err(ConfigError::InvalidPlaylistMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPlan {
    Insert { end: End, trim: Option<End> },
    SuppressedDuplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { trimmed: Option<PlaylistEntry> },
    SuppressedDuplicate,
}

/// Local mirror of one provider playlist for one station.
///
/// Entries are kept top first, the same order the provider lists them.
#[derive(Debug, Clone)]
pub struct PlaylistState {
    playlist_id: String,
    mode: PlaylistMode,
    max_size: usize,
    entries: VecDeque<PlaylistEntry>,
    pending_trim: bool,
}

impl PlaylistState {
    pub fn new(playlist_id: impl Into<String>, mode: PlaylistMode, max_size: usize) -> Self {
        Self::with_entries(playlist_id, mode, max_size, Vec::new())
    }

    pub fn with_entries(
        playlist_id: impl Into<String>,
        mode: PlaylistMode,
        max_size: usize,
        entries: Vec<PlaylistEntry>,
    ) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            mode,
            max_size,
            entries: entries.into(),
            pending_trim: false,
        }
    }

    /// Build the mirror from the provider's current contents.
    pub async fn load(
        provider: &dyn PlaylistProvider,
        playlist_id: &str,
        mode: PlaylistMode,
        max_size: usize,
    ) -> Result<Self, String> {
        let entries = provider.list_tracks(playlist_id).await?;
        if max_size > 0 && entries.len() > max_size {
            tracing::warn!(
                provider = %provider.kind(),
                playlist_id,
                len = entries.len(),
                max_size,
                "playlist already exceeds its size limit; only one entry is trimmed per insertion"
            );
        }
        Ok(Self::with_entries(playlist_id, mode, max_size, entries))
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn mode(&self) -> PlaylistMode {
        self.mode
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending_trim(&self) -> bool {
        self.pending_trim
    }

    pub fn entries(&self) -> impl Iterator<Item = &PlaylistEntry> {
        self.entries.iter()
    }

    pub fn track_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.track_id.as_str()).collect()
    }

    /// The entry at the end new tracks go to.
    pub fn most_recent(&self) -> Option<&PlaylistEntry> {
        self.peek(self.mode.insert_end())
    }

    /// Mark a trim as owed, to be checked against the current length before
    /// the next insertion.
    pub fn schedule_trim(&mut self) {
        self.pending_trim = true;
    }

    pub fn consider_insert(&self, track_id: &str, now: DateTime<Utc>) -> InsertPlan {
        if self
            .most_recent()
            .is_some_and(|recent| repeats(recent, track_id, now))
        {
            return InsertPlan::SuppressedDuplicate;
        }
        let trim = (self.max_size > 0 && self.entries.len() + 1 > self.max_size)
            .then(|| self.mode.trim_end());
        InsertPlan::Insert {
            end: self.mode.insert_end(),
            trim,
        }
    }

    /// Apply a plan to the mirror only.
    pub fn apply(&mut self, plan: InsertPlan, entry: PlaylistEntry) -> InsertOutcome {
        match plan {
            InsertPlan::SuppressedDuplicate => InsertOutcome::SuppressedDuplicate,
            InsertPlan::Insert { end, trim } => {
                self.push(end, entry);
                let trimmed = trim.and_then(|end| self.pop(end));
                InsertOutcome::Inserted { trimmed }
            }
        }
    }

    /// Plan and apply an insertion to the mirror only.
    pub fn insert(&mut self, track_id: &str, now: DateTime<Utc>) -> InsertOutcome {
        let plan = self.consider_insert(track_id, now);
        let entry = PlaylistEntry {
            track_id: track_id.to_string(),
            inserted_at: now,
            item_id: None,
        };
        self.apply(plan, entry)
    }

    /// Insert `track_id` into the provider playlist and keep the mirror in step.
    ///
    /// The provider's own most recent entry is checked for a repeat as well
    /// as the mirror's. The trim is only attempted after the insertion
    /// succeeded. A failed trim is kept pending and must succeed before the
    /// next insertion goes out.
    pub async fn write(
        &mut self,
        provider: &dyn PlaylistProvider,
        track_id: &str,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, String> {
        if self.pending_trim {
            self.retry_trim(provider).await?;
        }

        let live = provider
            .most_recent_track(&self.playlist_id)
            .await
            .map_err(|err| format!("most recent track: {err}"))?;
        if live.is_some_and(|entry| repeats(&entry, track_id, now)) {
            return Ok(InsertOutcome::SuppressedDuplicate);
        }

        let InsertPlan::Insert { end, trim } = self.consider_insert(track_id, now) else {
            return Ok(InsertOutcome::SuppressedDuplicate);
        };

        let item_id = match end {
            End::Top => provider.insert_top(&self.playlist_id, track_id).await?,
            End::Bottom => provider.insert_bottom(&self.playlist_id, track_id).await?,
        };
        self.push(
            end,
            PlaylistEntry {
                track_id: track_id.to_string(),
                inserted_at: now,
                item_id,
            },
        );

        let Some(trim_end) = trim else {
            return Ok(InsertOutcome::Inserted { trimmed: None });
        };
        match self.remove_remote(provider, trim_end).await {
            Ok(trimmed) => Ok(InsertOutcome::Inserted { trimmed }),
            Err(err) => {
                tracing::warn!(
                    provider = %provider.kind(),
                    playlist_id = %self.playlist_id,
                    error = %err,
                    "trim failed after insert; will retry before next insert"
                );
                self.pending_trim = true;
                Ok(InsertOutcome::Inserted { trimmed: None })
            }
        }
    }

    async fn retry_trim(&mut self, provider: &dyn PlaylistProvider) -> Result<(), String> {
        if self.max_size > 0 && self.entries.len() > self.max_size {
            self.remove_remote(provider, self.mode.trim_end())
                .await
                .map_err(|err| format!("retry pending trim: {err}"))?;
        }
        self.pending_trim = false;
        Ok(())
    }

    async fn remove_remote(
        &mut self,
        provider: &dyn PlaylistProvider,
        end: End,
    ) -> Result<Option<PlaylistEntry>, String> {
        let Some(entry) = self.peek(end) else {
            return Ok(None);
        };
        match end {
            End::Top => provider.remove_top(&self.playlist_id, entry).await?,
            End::Bottom => {
                let position = self.entries.len() - 1;
                provider
                    .remove_bottom(&self.playlist_id, entry, position)
                    .await?
            }
        }
        Ok(self.pop(end))
    }

    fn peek(&self, end: End) -> Option<&PlaylistEntry> {
        match end {
            End::Top => self.entries.front(),
            End::Bottom => self.entries.back(),
        }
    }

    fn push(&mut self, end: End, entry: PlaylistEntry) {
        match end {
            End::Top => self.entries.push_front(entry),
            End::Bottom => self.entries.push_back(entry),
        }
    }

    fn pop(&mut self, end: End) -> Option<PlaylistEntry> {
        match end {
            End::Top => self.entries.pop_front(),
            End::Bottom => self.entries.pop_back(),
        }
    }
}

/// Same track as `recent`, inserted less than the duplicate window ago.
fn repeats(recent: &PlaylistEntry, track_id: &str, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(recent.inserted_at).num_seconds();
    recent.track_id == track_id && age < DUPLICATE_WINDOW_SECS
}
