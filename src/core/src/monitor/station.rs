use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use radiomon_protocol::{LastMatch, MonitorState};
use tokio::sync::watch;

use super::status::StatusHandle;
use super::supervisor::Collaborators;
use crate::capture::AudioSampler;
use crate::config::StationConfig;
use crate::error::{ConfigError, MonitorError};
use crate::history::{HistoryStore, PlayEvent};
use crate::playlist::{InsertOutcome, PlaylistMode, PlaylistProvider, PlaylistState, PlaylistTarget};
use crate::recognition::{Recognition, Recognizer};

/// Time source for monitors, replaceable in tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    /// Local wall-clock time, used for skip windows.
    fn local_now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Result of one playlist target for one recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResult {
    Inserted {
        track_id: String,
        trimmed: Option<String>,
    },
    SuppressedDuplicate {
        track_id: String,
    },
    NotFound,
    Failed(MonitorError),
}

impl TargetResult {
    pub fn track_id(&self) -> Option<&str> {
        match self {
            Self::Inserted { track_id, .. } | Self::SuppressedDuplicate { track_id } => {
                Some(track_id)
            }
            Self::NotFound | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: PlaylistTarget,
    pub result: TargetResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Disabled,
    Recorded { pruned: usize },
    Failed(MonitorError),
}

/// What one monitor tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped,
    NoMatch,
    Matched {
        recognition: Recognition,
        targets: Vec<TargetOutcome>,
        history: HistoryOutcome,
    },
    Errored(MonitorError),
}

impl CycleOutcome {
    /// Every collaborator failure that happened during the cycle.
    pub fn errors(&self) -> Vec<&MonitorError> {
        match self {
            Self::Skipped | Self::NoMatch => Vec::new(),
            Self::Errored(err) => vec![err],
            Self::Matched { targets, history, .. } => {
                let mut errors: Vec<&MonitorError> = targets
                    .iter()
                    .filter_map(|t| match &t.result {
                        TargetResult::Failed(err) => Some(err),
                        _ => None,
                    })
                    .collect();
                if let HistoryOutcome::Failed(err) = history {
                    errors.push(err);
                }
                errors
            }
        }
    }
}

/// One playlist target of a station: provider client plus local mirror.
///
/// The mirror is dropped after any failed write or failed trim and reloaded
/// from the provider on the next write, so edits made outside radiomon are
/// picked up.
pub struct TargetWriter {
    target: PlaylistTarget,
    provider: Arc<dyn PlaylistProvider>,
    mode: PlaylistMode,
    max_size: usize,
    state: Option<PlaylistState>,
    /// A trim was owed when the mirror was dropped.
    trim_owed: bool,
}

impl TargetWriter {
    pub fn new(
        target: PlaylistTarget,
        provider: Arc<dyn PlaylistProvider>,
        mode: PlaylistMode,
        max_size: usize,
    ) -> Self {
        Self {
            target,
            provider,
            mode,
            max_size,
            state: None,
            trim_owed: false,
        }
    }

    pub fn target(&self) -> &PlaylistTarget {
        &self.target
    }

    pub fn state(&self) -> Option<&PlaylistState> {
        self.state.as_ref()
    }

    /// Load the mirror if it is not loaded yet.
    pub async fn ensure_loaded(&mut self) -> Result<&mut PlaylistState, MonitorError> {
        if self.state.is_none() {
            let mut loaded = PlaylistState::load(
                self.provider.as_ref(),
                &self.target.playlist_id,
                self.mode,
                self.max_size,
            )
            .await
            .map_err(|err| self.error(format!("load playlist: {err}")))?;
            if std::mem::take(&mut self.trim_owed) {
                loaded.schedule_trim();
            }
            tracing::debug!(
                provider = %self.target.provider,
                playlist_id = %self.target.playlist_id,
                len = loaded.len(),
                "playlist loaded"
            );
            self.state = Some(loaded);
        }
        let missing = self.error("playlist state unavailable".to_string());
        self.state.as_mut().ok_or(missing)
    }

    pub async fn write(&mut self, recognition: &Recognition, now: DateTime<Utc>) -> TargetResult {
        let provider = self.provider.clone();
        let track_id = match provider.search_track(recognition).await {
            Ok(Some(track_id)) => track_id,
            Ok(None) => return TargetResult::NotFound,
            Err(err) => return TargetResult::Failed(self.error(format!("search: {err}"))),
        };

        let (written, trim_owed) = match self.ensure_loaded().await {
            Ok(state) => {
                let written = state.write(provider.as_ref(), &track_id, now).await;
                (written, state.has_pending_trim())
            }
            Err(err) => return TargetResult::Failed(err),
        };
        if written.is_err() || trim_owed {
            self.invalidate(trim_owed);
        }
        match written {
            Ok(InsertOutcome::Inserted { trimmed }) => TargetResult::Inserted {
                track_id,
                trimmed: trimmed.map(|entry| entry.track_id),
            },
            Ok(InsertOutcome::SuppressedDuplicate) => {
                TargetResult::SuppressedDuplicate { track_id }
            }
            Err(err) => TargetResult::Failed(self.error(err)),
        }
    }

    /// Forget the mirror; the next write reloads it from the provider.
    fn invalidate(&mut self, trim_owed: bool) {
        tracing::debug!(
            provider = %self.target.provider,
            playlist_id = %self.target.playlist_id,
            trim_owed,
            "playlist mirror dropped; reloading on next write"
        );
        self.state = None;
        self.trim_owed = trim_owed;
    }

    fn error(&self, message: String) -> MonitorError {
        MonitorError::Provider {
            provider: self.target.provider.as_str(),
            playlist_id: self.target.playlist_id.clone(),
            message,
        }
    }
}

/// Polling loop of one station.
///
/// Each tick samples the stream, identifies the track and writes it to every
/// playlist target, then records one history row. Failures are local to the
/// tick; the next tick starts fresh.
pub struct StationMonitor {
    config: StationConfig,
    sampler: Arc<dyn AudioSampler>,
    recognizer: Arc<dyn Recognizer>,
    writers: Vec<TargetWriter>,
    history: Option<HistoryStore>,
    clock: Arc<dyn Clock>,
    status: StatusHandle,
    in_skip_window: bool,
}

impl StationMonitor {
    pub fn new(
        config: StationConfig,
        collaborators: &Collaborators,
        history: Option<HistoryStore>,
        clock: Arc<dyn Clock>,
        status: StatusHandle,
    ) -> Result<Self, ConfigError> {
        let writers = config
            .targets
            .iter()
            .map(|target| {
                let provider = collaborators.provider(target.provider).ok_or_else(|| {
                    ConfigError::MissingCredentials {
                        station: config.name.clone(),
                        provider: target.provider.as_str(),
                    }
                })?;
                Ok(TargetWriter::new(
                    target.clone(),
                    provider,
                    config.playlist_mode,
                    config.playlist_max_size,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        // History without a retention policy is never written.
        let history = history.filter(|_| config.analytics.is_some());

        Ok(Self {
            sampler: collaborators.sampler.clone(),
            recognizer: collaborators.recognizer.clone(),
            writers,
            history,
            clock,
            status,
            in_skip_window: false,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn writers(&self) -> &[TargetWriter] {
        &self.writers
    }

    /// Load every playlist mirror. Targets that fail stay unloaded and are
    /// retried on their first write.
    pub async fn prepare(&mut self) {
        for writer in &mut self.writers {
            if let Err(err) = writer.ensure_loaded().await {
                tracing::warn!(error = %err, "playlist load failed; will retry on first write");
            }
        }
    }

    /// Run until `stop` flips to true (or its sender goes away).
    ///
    /// Stop is only observed between cycles; a cycle in flight completes.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        tracing::info!(
            stream = %self.config.stream_url,
            targets = self.writers.len(),
            analytics = self.history.is_some(),
            poll_secs = self.config.poll_interval.as_secs(),
            "station monitor started"
        );
        self.prepare().await;

        loop {
            if *stop.borrow() {
                break;
            }
            let outcome = self.cycle().await;
            tracing::debug!(?outcome, "cycle finished");

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.status.set_state(MonitorState::Stopped);
        tracing::info!("station monitor stopped");
    }

    /// One tick: skip check, capture, recognition, writes, history.
    pub async fn cycle(&mut self) -> CycleOutcome {
        let skipping = self.config.skip.matches(&self.clock.local_now());
        if skipping != self.in_skip_window {
            if skipping {
                tracing::info!("entering skip window; sampling paused");
            } else {
                tracing::info!("leaving skip window; sampling resumed");
            }
            self.in_skip_window = skipping;
        }

        let outcome = if skipping {
            CycleOutcome::Skipped
        } else {
            self.sample_and_write().await
        };
        self.finish(&outcome);
        outcome
    }

    async fn sample_and_write(&mut self) -> CycleOutcome {
        self.status.update(|status| {
            status.state = MonitorState::Sampling;
            status.in_skip_window = false;
        });
        let audio = match self
            .sampler
            .capture(&self.config.stream_url, self.config.sample_duration)
            .await
        {
            Ok(audio) => audio,
            Err(err) => return CycleOutcome::Errored(MonitorError::Capture(err)),
        };

        self.status.set_state(MonitorState::Evaluating);
        let recognition = match self.recognizer.identify(&audio).await {
            Ok(Some(recognition)) => recognition,
            Ok(None) => {
                tracing::debug!(bytes = audio.len(), "no match");
                return CycleOutcome::NoMatch;
            }
            Err(err) => return CycleOutcome::Errored(MonitorError::Recognition(err)),
        };

        let now = self.clock.now();
        tracing::info!(artist = %recognition.artist, title = %recognition.title, "recognized");
        self.status.update(|status| {
            status.state = MonitorState::Writing;
            status.last_match = Some(LastMatch {
                artist: recognition.artist.clone(),
                title: recognition.title.clone(),
                matched_at: now.timestamp(),
            });
        });

        let mut targets = Vec::with_capacity(self.writers.len());
        for writer in &mut self.writers {
            let result = writer.write(&recognition, now).await;
            log_target_result(writer.target(), &result);
            targets.push(TargetOutcome {
                target: writer.target().clone(),
                result,
            });
        }

        let history = self.record_history(&recognition, &targets, now).await;
        CycleOutcome::Matched {
            recognition,
            targets,
            history,
        }
    }

    async fn record_history(
        &self,
        recognition: &Recognition,
        targets: &[TargetOutcome],
        now: DateTime<Utc>,
    ) -> HistoryOutcome {
        let (Some(history), Some(policy)) = (self.history.clone(), self.config.analytics) else {
            return HistoryOutcome::Disabled;
        };
        let event = PlayEvent {
            station: self.config.name.clone(),
            artist: recognition.artist.clone(),
            title: recognition.title.clone(),
            track_uri: targets
                .iter()
                .find_map(|t| t.result.track_id())
                .map(str::to_string),
            played_at: now,
        };
        let retention_days = policy.retention_days;
        let recorded = tokio::task::spawn_blocking(move || history.record(event, retention_days))
            .await
            .map_err(|err| format!("history task: {err}"))
            .and_then(|result| result);
        match recorded {
            Ok(pruned) => HistoryOutcome::Recorded { pruned },
            Err(err) => {
                let err = MonitorError::Storage(err);
                tracing::warn!(error = %err, "play history write failed");
                HistoryOutcome::Failed(err)
            }
        }
    }

    fn finish(&self, outcome: &CycleOutcome) {
        if let CycleOutcome::Errored(err) = outcome {
            tracing::warn!(error = %err, kind = err.kind(), "cycle failed");
        }
        let errors = outcome.errors();
        let finished_at = self.clock.now().timestamp();
        let skipping = matches!(outcome, CycleOutcome::Skipped);
        self.status.update(|status| {
            status.cycles += 1;
            status.last_cycle_at = Some(finished_at);
            status.in_skip_window = skipping;
            status.error_count += errors.len() as u64;
            if let Some(last) = errors.last() {
                status.last_error = Some(last.to_string());
            }
            status.state = if skipping {
                MonitorState::Skipping
            } else if errors.is_empty() {
                MonitorState::Idle
            } else {
                MonitorState::Errored
            };
        });
    }
}

fn log_target_result(target: &PlaylistTarget, result: &TargetResult) {
    let provider = target.provider.as_str();
    let playlist_id = target.playlist_id.as_str();
    match result {
        TargetResult::Inserted { track_id, trimmed } => tracing::info!(
            provider,
            playlist_id,
            track_id = %track_id,
            trimmed = trimmed.as_deref().unwrap_or("-"),
            "added to playlist"
        ),
        TargetResult::SuppressedDuplicate { track_id } => tracing::info!(
            provider,
            playlist_id,
            track_id = %track_id,
            "same track as last insert; skipped"
        ),
        TargetResult::NotFound => {
            tracing::info!(provider, playlist_id, "no matching track on provider")
        }
        TargetResult::Failed(err) => tracing::warn!(
            provider,
            playlist_id,
            error = %err,
            "playlist write failed"
        ),
    }
}
