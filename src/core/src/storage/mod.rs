mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{PlayCursor, PlayFilter, PlayRecord};

use radiomon_protocol::{DayCount, DowCount, HourCount, TopArtist, TopSong};

/// Durable play history.
///
/// All methods use `&self`; implementations handle interior mutability
/// (e.g. `Mutex<Connection>` for sqlite).
pub trait Store: Send + Sync + 'static {
    /// Insert a play, then delete that station's plays older than
    /// `prune_before`, atomically. Returns the number of pruned rows.
    fn record_play(&self, play: &PlayRecord, prune_before: Option<i64>) -> Result<usize, String>;

    /// Delete plays of `station` strictly older than `cutoff`.
    fn prune_plays(&self, station: &str, cutoff: i64) -> Result<usize, String>;

    /// One page of plays, newest first, strictly after `after`.
    fn plays_page(
        &self,
        filter: &PlayFilter,
        after: Option<&PlayCursor>,
        limit: usize,
    ) -> Result<Vec<PlayRecord>, String>;

    fn count_plays(&self, filter: &PlayFilter) -> Result<u64, String>;

    /// Most played (artist, title) pairs, case-insensitive. Repeated plays
    /// rank before one-offs, then by count, then by most recent play.
    fn top_songs(&self, filter: &PlayFilter, limit: usize) -> Result<Vec<TopSong>, String>;

    /// Same ranking as [`Store::top_songs`], grouped by artist.
    fn top_artists(&self, filter: &PlayFilter, limit: usize) -> Result<Vec<TopArtist>, String>;

    /// 24 buckets, hour of day in UTC.
    fn plays_by_hour(&self, filter: &PlayFilter) -> Result<Vec<HourCount>, String>;

    /// 7 buckets, Sunday first.
    fn plays_by_dow(&self, filter: &PlayFilter) -> Result<Vec<DowCount>, String>;

    /// One bucket per UTC calendar day with plays, oldest first.
    fn plays_by_day(&self, filter: &PlayFilter) -> Result<Vec<DayCount>, String>;
}
