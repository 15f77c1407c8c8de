use std::path::Path;
use std::sync::Mutex;

use radiomon_protocol::{DayCount, DowCount, HourCount, TopArtist, TopSong};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use super::types::{PlayCursor, PlayFilter, PlayRecord};
use super::Store;

const DOW_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// SQLite-backed play history.
///
/// Uses a `Mutex<Connection>` for thread-safe interior mutability.
/// The database is created/migrated on `open()`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a sqlite database at the given path.
    pub fn open(path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("create {}: {e}", parent.display()))?;
        }
        let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| format!("sqlite wal: {e}"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| format!("sqlite open: {e}"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS plays (
                event_id   TEXT PRIMARY KEY,
                station    TEXT NOT NULL,
                artist     TEXT NOT NULL,
                title      TEXT NOT NULL,
                track_uri  TEXT,
                played_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_plays_station_played
                ON plays (station, played_at);
            CREATE INDEX IF NOT EXISTS idx_plays_played
                ON plays (played_at);
            ",
        )
        .map_err(|e| format!("migrate: {e}"))?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn record_play(&self, play: &PlayRecord, prune_before: Option<i64>) -> Result<usize, String> {
        let mut conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let tx = conn
            .transaction()
            .map_err(|e| format!("record_play begin: {e}"))?;
        tx.execute(
            "INSERT INTO plays (event_id, station, artist, title, track_uri, played_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                play.event_id,
                play.station,
                play.artist,
                play.title,
                play.track_uri,
                play.played_at,
            ],
        )
        .map_err(|e| format!("record_play insert: {e}"))?;
        let pruned = match prune_before {
            Some(cutoff) => tx
                .execute(
                    "DELETE FROM plays WHERE station = ?1 AND played_at < ?2",
                    params![play.station, cutoff],
                )
                .map_err(|e| format!("record_play prune: {e}"))?,
            None => 0,
        };
        tx.commit().map_err(|e| format!("record_play commit: {e}"))?;
        Ok(pruned)
    }

    fn prune_plays(&self, station: &str, cutoff: i64) -> Result<usize, String> {
        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        conn.execute(
            "DELETE FROM plays WHERE station = ?1 AND played_at < ?2",
            params![station, cutoff],
        )
        .map_err(|e| format!("prune_plays: {e}"))
    }

    fn plays_page(
        &self,
        filter: &PlayFilter,
        after: Option<&PlayCursor>,
        limit: usize,
    ) -> Result<Vec<PlayRecord>, String> {
        let (mut conditions, mut values) = filter_conditions(filter);
        if let Some(cursor) = after {
            conditions.push("(played_at < ? OR (played_at = ? AND event_id < ?))".to_string());
            values.push(SqlValue::Integer(cursor.played_at));
            values.push(SqlValue::Integer(cursor.played_at));
            values.push(SqlValue::Text(cursor.event_id.clone()));
        }
        values.push(SqlValue::Integer(limit as i64));
        let sql = format!(
            "SELECT event_id, station, artist, title, track_uri, played_at
             FROM plays {} ORDER BY played_at DESC, event_id DESC LIMIT ?",
            where_sql(&conditions)
        );

        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("plays_page prepare: {e}"))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(PlayRecord {
                    event_id: row.get(0)?,
                    station: row.get(1)?,
                    artist: row.get(2)?,
                    title: row.get(3)?,
                    track_uri: row.get(4)?,
                    played_at: row.get(5)?,
                })
            })
            .map_err(|e| format!("plays_page query: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("plays_page collect: {e}"))
    }

    fn count_plays(&self, filter: &PlayFilter) -> Result<u64, String> {
        let (conditions, values) = filter_conditions(filter);
        let sql = format!("SELECT COUNT(*) FROM plays {}", where_sql(&conditions));
        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        conn.query_row(&sql, params_from_iter(values), |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| format!("count_plays: {e}"))
    }

    fn top_songs(&self, filter: &PlayFilter, limit: usize) -> Result<Vec<TopSong>, String> {
        let (conditions, mut values) = filter_conditions(filter);
        values.push(SqlValue::Integer(limit as i64));
        let sql = format!(
            "SELECT MAX(artist), MAX(title), COUNT(*), MAX(track_uri)
             FROM plays {}
             GROUP BY lower(artist), lower(title)
             ORDER BY CASE WHEN COUNT(*) > 1 THEN 0 ELSE 1 END,
                      COUNT(*) DESC, MAX(played_at) DESC
             LIMIT ?",
            where_sql(&conditions)
        );

        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("top_songs prepare: {e}"))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(TopSong {
                    artist: row.get(0)?,
                    title: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                    track_uri: row.get(3)?,
                })
            })
            .map_err(|e| format!("top_songs query: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("top_songs collect: {e}"))
    }

    fn top_artists(&self, filter: &PlayFilter, limit: usize) -> Result<Vec<TopArtist>, String> {
        let (conditions, mut values) = filter_conditions(filter);
        values.push(SqlValue::Integer(limit as i64));
        let sql = format!(
            "SELECT MAX(artist), COUNT(*)
             FROM plays {}
             GROUP BY lower(artist)
             ORDER BY CASE WHEN COUNT(*) > 1 THEN 0 ELSE 1 END,
                      COUNT(*) DESC, MAX(played_at) DESC
             LIMIT ?",
            where_sql(&conditions)
        );

        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("top_artists prepare: {e}"))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(TopArtist {
                    artist: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(|e| format!("top_artists query: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("top_artists collect: {e}"))
    }

    fn plays_by_hour(&self, filter: &PlayFilter) -> Result<Vec<HourCount>, String> {
        let counts = self.bucket_counts(
            filter,
            "CAST(strftime('%H', played_at, 'unixepoch') AS INTEGER)",
            "plays_by_hour",
        )?;
        Ok((0..24u8)
            .map(|hour| HourCount {
                hour,
                count: lookup(&counts, i64::from(hour)),
            })
            .collect())
    }

    fn plays_by_dow(&self, filter: &PlayFilter) -> Result<Vec<DowCount>, String> {
        let counts = self.bucket_counts(
            filter,
            "CAST(strftime('%w', played_at, 'unixepoch') AS INTEGER)",
            "plays_by_dow",
        )?;
        Ok(DOW_LABELS
            .iter()
            .enumerate()
            .map(|(dow, label)| DowCount {
                dow: dow as u8,
                label: (*label).to_string(),
                count: lookup(&counts, dow as i64),
            })
            .collect())
    }

    fn plays_by_day(&self, filter: &PlayFilter) -> Result<Vec<DayCount>, String> {
        let (conditions, values) = filter_conditions(filter);
        let sql = format!(
            "SELECT date(played_at, 'unixepoch') AS day, COUNT(*)
             FROM plays {} GROUP BY day ORDER BY day",
            where_sql(&conditions)
        );

        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("plays_by_day prepare: {e}"))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(DayCount {
                    day: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(|e| format!("plays_by_day query: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("plays_by_day collect: {e}"))
    }
}

impl SqliteStore {
    fn bucket_counts(
        &self,
        filter: &PlayFilter,
        bucket_expr: &str,
        label: &str,
    ) -> Result<Vec<(i64, u64)>, String> {
        let (conditions, values) = filter_conditions(filter);
        let sql = format!(
            "SELECT {bucket_expr} AS bucket, COUNT(*)
             FROM plays {} GROUP BY bucket ORDER BY bucket",
            where_sql(&conditions)
        );

        let conn = self.conn.lock().map_err(|e| format!("lock: {e}"))?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("{label} prepare: {e}"))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| format!("{label} query: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("{label} collect: {e}"))
    }
}

fn filter_conditions(filter: &PlayFilter) -> (Vec<String>, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    if let Some(station) = &filter.station {
        conditions.push("station = ?".to_string());
        values.push(SqlValue::Text(station.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push("played_at >= ?".to_string());
        values.push(SqlValue::Integer(since));
    }
    if let Some(artist) = &filter.artist {
        conditions.push("lower(artist) = lower(?)".to_string());
        values.push(SqlValue::Text(artist.clone()));
    }
    (conditions, values)
}

fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn lookup(counts: &[(i64, u64)], bucket: i64) -> u64 {
    counts
        .iter()
        .find(|(b, _)| *b == bucket)
        .map(|(_, count)| *count)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-05-05 was a Sunday.
    const SUNDAY_NOON: i64 = 1_714_910_400;

    fn make_store() -> SqliteStore {
        SqliteStore::open_memory().unwrap()
    }

    fn play(id: &str, station: &str, artist: &str, title: &str, played_at: i64) -> PlayRecord {
        PlayRecord {
            event_id: id.into(),
            station: station.into(),
            artist: artist.into(),
            title: title.into(),
            track_uri: None,
            played_at,
        }
    }

    #[test]
    fn record_prunes_only_the_same_station() {
        let store = make_store();
        store.record_play(&play("a1", "a", "X", "Old", 100), None).unwrap();
        store.record_play(&play("b1", "b", "X", "Old", 100), None).unwrap();
        let pruned = store
            .record_play(&play("a2", "a", "X", "New", 1_000), Some(500))
            .unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.count_plays(&PlayFilter::station("a")).unwrap(), 1);
        assert_eq!(store.count_plays(&PlayFilter::station("b")).unwrap(), 1);
    }

    #[test]
    fn prune_is_strictly_older_than_cutoff() {
        let store = make_store();
        store.record_play(&play("1", "a", "X", "T", 499), None).unwrap();
        store.record_play(&play("2", "a", "X", "T", 500), None).unwrap();
        assert_eq!(store.prune_plays("a", 500).unwrap(), 1);
        let left = store.plays_page(&PlayFilter::default(), None, 10).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].played_at, 500);
    }

    #[test]
    fn pages_walk_newest_first_without_gaps() {
        let store = make_store();
        for (i, at) in [10, 20, 20, 30, 40].iter().enumerate() {
            store
                .record_play(&play(&format!("e{i}"), "a", "X", "T", *at), None)
                .unwrap();
        }
        let filter = PlayFilter::default();
        let first = store.plays_page(&filter, None, 2).unwrap();
        let second = store
            .plays_page(&filter, first.last().map(PlayRecord::cursor).as_ref(), 2)
            .unwrap();
        let third = store
            .plays_page(&filter, second.last().map(PlayRecord::cursor).as_ref(), 2)
            .unwrap();
        let times: Vec<i64> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|p| p.played_at)
            .collect();
        assert_eq!(times, vec![40, 30, 20, 20, 10]);
    }

    #[test]
    fn top_songs_group_case_insensitively_and_rank_repeats_first() {
        let store = make_store();
        store.record_play(&play("1", "a", "Adele", "Hello", 100), None).unwrap();
        store.record_play(&play("2", "a", "ADELE", "hello", 200), None).unwrap();
        store.record_play(&play("3", "a", "Muse", "Uprising", 300), None).unwrap();
        let top = store.top_songs(&PlayFilter::default(), 10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].count, 2);
        assert!(top[0].artist.eq_ignore_ascii_case("adele"));
        assert_eq!(top[1].title, "Uprising");

        let artists = store.top_artists(&PlayFilter::default(), 10).unwrap();
        assert_eq!(artists[0].count, 2);
    }

    #[test]
    fn one_offs_rank_by_recency() {
        let store = make_store();
        store.record_play(&play("1", "a", "Old", "T", 100), None).unwrap();
        store.record_play(&play("2", "a", "New", "T", 200), None).unwrap();
        let artists = store.top_artists(&PlayFilter::default(), 10).unwrap();
        assert_eq!(artists[0].artist, "New");
    }

    #[test]
    fn hour_and_dow_buckets_are_complete() {
        let store = make_store();
        store
            .record_play(&play("1", "a", "X", "T", SUNDAY_NOON), None)
            .unwrap();
        store
            .record_play(&play("2", "a", "X", "T", SUNDAY_NOON + 86_400 + 3_600), None)
            .unwrap();

        let hours = store.plays_by_hour(&PlayFilter::default()).unwrap();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[12].count, 1);
        assert_eq!(hours[13].count, 1);
        assert_eq!(hours[0].count, 0);

        let dows = store.plays_by_dow(&PlayFilter::default()).unwrap();
        assert_eq!(dows.len(), 7);
        assert_eq!(dows[0].label, "Sun");
        assert_eq!(dows[0].count, 1);
        assert_eq!(dows[1].count, 1);

        let days = store.plays_by_day(&PlayFilter::default()).unwrap();
        assert_eq!(
            days.iter().map(|d| d.day.as_str()).collect::<Vec<_>>(),
            vec!["2024-05-05", "2024-05-06"]
        );
    }

    #[test]
    fn filters_combine_station_since_and_artist() {
        let store = make_store();
        store.record_play(&play("1", "a", "Muse", "T1", 100), None).unwrap();
        store.record_play(&play("2", "a", "muse", "T2", 300), None).unwrap();
        store.record_play(&play("3", "b", "Muse", "T3", 300), None).unwrap();
        let filter = PlayFilter::station("a")
            .with_since(Some(200))
            .with_artist("MUSE");
        let songs = store.top_songs(&filter, 10).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "T2");
    }
}
