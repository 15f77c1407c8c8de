#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use radiomon_core::{
    AudioSampler, Clock, PlaylistEntry, PlaylistProvider, ProviderKind, Recognition, Recognizer,
};

// ── Sampler ──────────────────────────────────────────────────────────

/// Returns the source URL as the "audio" unless told otherwise.
#[derive(Default)]
pub struct FakeSampler {
    pub calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    scripted: Mutex<VecDeque<Result<Vec<u8>, String>>>,
}

impl FakeSampler {
    pub fn fail_source(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    pub fn panic_on(&self, source: &str) {
        self.panicking.lock().unwrap().insert(source.to_string());
    }

    pub fn push(&self, result: Result<Vec<u8>, String>) {
        self.scripted.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AudioSampler for FakeSampler {
    fn capture<'a>(
        &'a self,
        source: &'a str,
        _duration: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panicking.lock().unwrap().contains(source) {
                panic!("sampler exploded on {source}");
            }
            if self.failing.lock().unwrap().contains(source) {
                return Err(format!("stream {source} unreachable"));
            }
            if let Some(result) = self.scripted.lock().unwrap().pop_front() {
                return result;
            }
            Ok(source.as_bytes().to_vec())
        })
    }
}

// ── Recognizer ───────────────────────────────────────────────────────

/// Pops scripted answers; when the script is empty, "recognizes" the audio
/// bytes as a title by "Artist".
#[derive(Default)]
pub struct FakeRecognizer {
    scripted: Mutex<VecDeque<Result<Option<Recognition>, String>>>,
}

impl FakeRecognizer {
    pub fn push(&self, result: Result<Option<Recognition>, String>) {
        self.scripted.lock().unwrap().push_back(result);
    }

    pub fn push_match(&self, artist: &str, title: &str) {
        self.push(Ok(Some(Recognition::new(artist, title))));
    }
}

impl Recognizer for FakeRecognizer {
    fn identify<'a>(
        &'a self,
        audio: &'a [u8],
    ) -> BoxFuture<'a, Result<Option<Recognition>, String>> {
        Box::pin(async move {
            if let Some(result) = self.scripted.lock().unwrap().pop_front() {
                return result;
            }
            let title = String::from_utf8_lossy(audio).to_string();
            Ok(Some(Recognition::new("Artist", title)))
        })
    }
}

// ── Playlist provider ────────────────────────────────────────────────

#[derive(Default)]
struct PlaylistData {
    tracks: Vec<PlaylistEntry>,
    calls: Vec<String>,
    not_found: HashSet<String>,
    fail_inserts: usize,
    fail_removes: usize,
    fail_list: bool,
}

/// In-memory playlist that records every mutating call.
///
/// Inserts are stamped with the attached clock, or the epoch without one.
pub struct FakeProvider {
    kind: ProviderKind,
    clock: Option<Arc<FixedClock>>,
    data: Mutex<PlaylistData>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            clock: None,
            data: Mutex::new(PlaylistData::default()),
        }
    }

    pub fn stamped_by(mut self, clock: Arc<FixedClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Someone else adds a track at the top.
    pub fn add_externally(&self, track_id: &str) {
        let entry = PlaylistEntry {
            track_id: track_id.to_string(),
            inserted_at: self.stamp(),
            item_id: None,
        };
        self.data.lock().unwrap().tracks.insert(0, entry);
    }

    /// Someone else deletes the bottom track.
    pub fn remove_last_externally(&self) {
        self.data.lock().unwrap().tracks.pop();
    }

    fn stamp(&self) -> DateTime<Utc> {
        self.clock
            .as_ref()
            .map(|clock| clock.now())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn with_tracks(self, ids: &[&str]) -> Self {
        {
            let mut data = self.data.lock().unwrap();
            data.tracks = ids
                .iter()
                .map(|id| PlaylistEntry {
                    track_id: id.to_string(),
                    inserted_at: DateTime::<Utc>::UNIX_EPOCH,
                    item_id: None,
                })
                .collect();
        }
        self
    }

    pub fn track_ids(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        data.tracks.iter().map(|e| e.track_id.clone()).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    pub fn not_found(&self, title: &str) {
        self.data.lock().unwrap().not_found.insert(title.to_string());
    }

    pub fn fail_next_inserts(&self, n: usize) {
        self.data.lock().unwrap().fail_inserts = n;
    }

    pub fn fail_next_removes(&self, n: usize) {
        self.data.lock().unwrap().fail_removes = n;
    }

    pub fn fail_list(&self, fail: bool) {
        self.data.lock().unwrap().fail_list = fail;
    }

    fn insert(&self, track_id: &str, top: bool) -> Result<Option<String>, String> {
        let inserted_at = self.stamp();
        let mut data = self.data.lock().unwrap();
        let end = if top { "top" } else { "bottom" };
        data.calls.push(format!("insert_{end}:{track_id}"));
        if data.fail_inserts > 0 {
            data.fail_inserts -= 1;
            return Err("insert rejected".to_string());
        }
        let entry = PlaylistEntry {
            track_id: track_id.to_string(),
            inserted_at,
            item_id: None,
        };
        if top {
            data.tracks.insert(0, entry);
        } else {
            data.tracks.push(entry);
        }
        Ok(None)
    }

    fn remove(&self, position: Option<usize>) -> Result<(), String> {
        let mut data = self.data.lock().unwrap();
        let label = match position {
            Some(pos) => format!("remove_bottom:{pos}"),
            None => "remove_top".to_string(),
        };
        data.calls.push(label);
        if data.fail_removes > 0 {
            data.fail_removes -= 1;
            return Err("remove rejected".to_string());
        }
        match position {
            Some(pos) if pos < data.tracks.len() => {
                data.tracks.remove(pos);
            }
            Some(_) => return Err("position out of range".to_string()),
            None if !data.tracks.is_empty() => {
                data.tracks.remove(0);
            }
            None => return Err("playlist empty".to_string()),
        }
        Ok(())
    }
}

impl PlaylistProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn verify(&self) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async { Ok("fake account".to_string()) })
    }

    fn search_track<'a>(
        &'a self,
        track: &'a Recognition,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move {
            let data = self.data.lock().unwrap();
            if data.not_found.contains(&track.title) {
                return Ok(None);
            }
            Ok(Some(format!("uri:{}", track.title)))
        })
    }

    fn list_tracks<'a>(
        &'a self,
        _playlist_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PlaylistEntry>, String>> {
        Box::pin(async move {
            let data = self.data.lock().unwrap();
            if data.fail_list {
                return Err("list unavailable".to_string());
            }
            Ok(data.tracks.clone())
        })
    }

    fn insert_top<'a>(
        &'a self,
        _playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move { self.insert(track_id, true) })
    }

    fn insert_bottom<'a>(
        &'a self,
        _playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move { self.insert(track_id, false) })
    }

    fn remove_top<'a>(
        &'a self,
        _playlist_id: &'a str,
        _entry: &'a PlaylistEntry,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move { self.remove(None) })
    }

    fn remove_bottom<'a>(
        &'a self,
        _playlist_id: &'a str,
        _entry: &'a PlaylistEntry,
        position: usize,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move { self.remove(Some(position)) })
    }
}

// ── Clock ────────────────────────────────────────────────────────────

/// Manually advanced clock; local time equals UTC.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now.lock().unwrap().naive_utc()
    }
}
