use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use radiomon_protocol::{ArtistDetail, RecentPlay, StatsResponse, TimeRange, SECS_PER_DAY};
use uuid::Uuid;

use crate::storage::{PlayCursor, PlayFilter, PlayRecord, Store};

/// Rows fetched per round trip by [`PlayHistory`].
pub const HISTORY_PAGE_SIZE: usize = 200;
/// Default row limit of the top-N analytics queries.
pub const DEFAULT_TOP_LIMIT: usize = 20;

/// One observed play of a recognized track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub station: String,
    pub artist: String,
    pub title: String,
    pub track_uri: Option<String>,
    pub played_at: DateTime<Utc>,
}

impl PlayEvent {
    fn into_record(self) -> PlayRecord {
        PlayRecord {
            event_id: Uuid::new_v4().to_string(),
            station: self.station,
            artist: self.artist,
            title: self.title,
            track_uri: self.track_uri,
            played_at: self.played_at.timestamp(),
        }
    }
}

/// Append-only per-station play log with age-based retention.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn Store>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append `event`, then drop that station's plays older than
    /// `retention_days` before the event. Returns the number pruned.
    pub fn record(&self, event: PlayEvent, retention_days: u32) -> Result<usize, String> {
        let cutoff = retention_cutoff(event.played_at.timestamp(), retention_days);
        let station = event.station.clone();
        let pruned = self.store.record_play(&event.into_record(), Some(cutoff))?;
        if pruned > 0 {
            tracing::debug!(station = %station, pruned, retention_days, "pruned play history");
        }
        Ok(pruned)
    }

    /// Remove plays of `station` strictly older than `cutoff`.
    pub fn prune_older_than(&self, station: &str, cutoff: DateTime<Utc>) -> Result<usize, String> {
        self.store.prune_plays(station, cutoff.timestamp())
    }

    /// Lazily page through plays, newest first.
    pub fn query(
        &self,
        station: Option<&str>,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> PlayHistory {
        PlayHistory::new(self.store.clone(), self.filter(station, range, now), HISTORY_PAGE_SIZE)
    }

    pub fn recent(&self, station: Option<&str>, limit: usize) -> Result<Vec<RecentPlay>, String> {
        let filter = self.filter(station, TimeRange::AllTime, Utc::now());
        let rows = self.store.plays_page(&filter, None, limit)?;
        Ok(rows
            .into_iter()
            .map(|row| RecentPlay {
                station: row.station,
                artist: row.artist,
                title: row.title,
                played_at: row.played_at,
                track_uri: row.track_uri,
            })
            .collect())
    }

    pub fn stats(
        &self,
        station: Option<&str>,
        range: TimeRange,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<StatsResponse, String> {
        let filter = self.filter(station, range, now);
        Ok(StatsResponse {
            top_songs: self.store.top_songs(&filter, limit)?,
            top_artists: self.store.top_artists(&filter, limit)?,
            plays_by_hour: self.store.plays_by_hour(&filter)?,
            plays_by_dow: self.store.plays_by_dow(&filter)?,
        })
    }

    pub fn artist_detail(
        &self,
        artist: &str,
        station: Option<&str>,
        range: TimeRange,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<ArtistDetail, String> {
        let filter = self.filter(station, range, now).with_artist(artist);
        Ok(ArtistDetail {
            artist: artist.to_string(),
            songs: self.store.top_songs(&filter, limit)?,
            plays_by_day: self.store.plays_by_day(&filter)?,
        })
    }

    pub fn count(&self, station: Option<&str>) -> Result<u64, String> {
        self.store
            .count_plays(&self.filter(station, TimeRange::AllTime, Utc::now()))
    }

    fn filter(&self, station: Option<&str>, range: TimeRange, now: DateTime<Utc>) -> PlayFilter {
        PlayFilter {
            station: station.map(str::to_string),
            since: range.since(now.timestamp()),
            artist: None,
        }
    }
}

fn retention_cutoff(now: i64, retention_days: u32) -> i64 {
    now.saturating_sub(i64::from(retention_days).saturating_mul(SECS_PER_DAY))
}

/// Newest-first iterator over stored plays, fetched one page at a time.
pub struct PlayHistory {
    store: Arc<dyn Store>,
    filter: PlayFilter,
    page_size: usize,
    cursor: Option<PlayCursor>,
    buffer: VecDeque<PlayRecord>,
    exhausted: bool,
}

impl PlayHistory {
    fn new(store: Arc<dyn Store>, filter: PlayFilter, page_size: usize) -> Self {
        Self {
            store,
            filter,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<(), String> {
        let page = self
            .store
            .plays_page(&self.filter, self.cursor.as_ref(), self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.cursor());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for PlayHistory {
    type Item = Result<PlayRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
