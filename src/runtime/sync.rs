//! Debounced saving and remote-change polling of a shared board.
//!
//! Every save is a full overwrite of one date (`replace_range(date, date, ..)`),
//! and a poll that finds newer remote data drops local edits and reloads. The
//! model is last-writer-wins per day; nothing is merged.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::core::{Assignment, AssignmentStore, Board, PlanningError};
use crate::util::clock::now_ms;

/// Notification published by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The date was written to the store.
    Saved {
        /// Date.
        date: NaiveDate,
        /// Rows written.
        rows: usize,
    },
    /// The write failed; local state is kept and retried on the next save.
    SaveFailed {
        /// Date.
        date: NaiveDate,
        /// Failure.
        error: PlanningError,
    },
    /// A save was dropped because another store call was running for the date.
    SaveSkipped {
        /// Date.
        date: NaiveDate,
    },
    /// Newer remote data replaced the local board.
    ExternalUpdate {
        /// Date.
        date: NaiveDate,
        /// Whether unsaved local edits were thrown away.
        discarded_local_edits: bool,
        /// User-facing notice.
        notice: String,
    },
}

/// Result of [`SyncAdapter::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Rows were written.
    Saved,
    /// Nothing changed since the last save.
    Clean,
    /// Dropped: a store call for the date was already running.
    Skipped,
}

/// Result of [`SyncAdapter::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The store holds nothing newer.
    UpToDate,
    /// Not polled: a save for the date was running.
    Skipped,
    /// Remote data replaced the board.
    Reloaded {
        /// Whether unsaved local edits were thrown away.
        discarded_local_edits: bool,
    },
}

#[derive(Debug, Default)]
struct SyncState {
    active_date: Option<NaiveDate>,
    /// Debounce generation per date; a timer only fires if still current.
    debounce: HashMap<NaiveDate, u64>,
    pending: HashSet<NaiveDate>,
    saving: HashSet<NaiveDate>,
    polling: HashSet<NaiveDate>,
    saved_revision: HashMap<NaiveDate, u64>,
    last_sync_ms: HashMap<NaiveDate, u128>,
    last_synced_rows: HashMap<NaiveDate, Vec<Assignment>>,
}

impl SyncState {
    fn cancel_debounce(&mut self, date: NaiveDate) -> bool {
        *self.debounce.entry(date).or_insert(0) += 1;
        self.pending.remove(&date)
    }

    fn mark_synced(&mut self, date: NaiveDate, revision: u64, rows: Vec<Assignment>, at_ms: u128) {
        self.saved_revision.insert(date, revision);
        self.last_sync_ms.insert(date, at_ms);
        self.last_synced_rows.insert(date, rows);
    }
}

struct Inner {
    store: Arc<dyn AssignmentStore>,
    board: Arc<Mutex<Board>>,
    config: SyncConfig,
    state: Mutex<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

/// Keeps a shared [`Board`] and an [`AssignmentStore`] converged.
///
/// Cheap to clone; clones share state. Scheduling and polling spawn tokio tasks,
/// so they must run inside a tokio runtime.
#[derive(Clone)]
pub struct SyncAdapter {
    inner: Arc<Inner>,
}

impl SyncAdapter {
    /// Create an adapter over a board and a store.
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        board: Arc<Mutex<Board>>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                store,
                board,
                config,
                state: Mutex::new(SyncState::default()),
                events,
            }),
        }
    }

    /// Shared board.
    pub fn board(&self) -> &Arc<Mutex<Board>> {
        &self.inner.board
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Date currently shown to the user.
    pub fn active_date(&self) -> Option<NaiveDate> {
        self.inner.state.lock().active_date
    }

    /// Whether the board holds edits for `date` not yet written to the store.
    pub fn is_dirty(&self, date: NaiveDate) -> bool {
        let state = self.inner.state.lock();
        self.dirty_locked(&state, date)
    }

    /// Whether a debounced save is armed for `date`.
    pub fn has_pending_save(&self, date: NaiveDate) -> bool {
        self.inner.state.lock().pending.contains(&date)
    }

    /// Arm (or re-arm) the debounce timer for `date`.
    ///
    /// Rapid calls coalesce: each call resets the quiet window, and only the
    /// last timer saves.
    pub fn schedule_save(&self, date: NaiveDate) {
        let generation = {
            let mut state = self.inner.state.lock();
            state.pending.insert(date);
            let generation = state.debounce.entry(date).or_insert(0);
            *generation += 1;
            *generation
        };
        let adapter = self.clone();
        let quiet = self.inner.config.debounce();
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let current = {
                let mut state = adapter.inner.state.lock();
                let current = state.debounce.get(&date).copied() == Some(generation);
                if current {
                    state.pending.remove(&date);
                }
                current
            };
            if current {
                if let Err(error) = adapter.flush(date).await {
                    debug!(%date, %error, "debounced save failed");
                }
            }
        });
    }

    /// Write `date` to the store now if it has unsaved edits.
    pub async fn flush(&self, date: NaiveDate) -> Result<SaveOutcome, PlanningError> {
        let (rows, revision) = {
            let mut state = self.inner.state.lock();
            if state.saving.contains(&date) {
                drop(state);
                debug!(%date, "save already in flight, dropped");
                self.publish(SyncEvent::SaveSkipped { date });
                return Ok(SaveOutcome::Skipped);
            }
            if state.polling.contains(&date) {
                drop(state);
                debug!(%date, "poll in flight, save re-armed");
                self.publish(SyncEvent::SaveSkipped { date });
                self.schedule_save(date);
                return Ok(SaveOutcome::Skipped);
            }
            let board = self.inner.board.lock();
            let revision = board.revision(date);
            if state.saved_revision.get(&date).copied().unwrap_or(0) == revision {
                return Ok(SaveOutcome::Clean);
            }
            state.saving.insert(date);
            (board.rows_for(date), revision)
        };

        let result = self
            .inner
            .store
            .replace_range(date, date, rows.clone())
            .await;

        let still_dirty = {
            let mut state = self.inner.state.lock();
            state.saving.remove(&date);
            if result.is_ok() {
                let count = rows.len();
                state.mark_synced(date, revision, rows, now_ms());
                info!(%date, rows = count, "day saved");
                self.publish(SyncEvent::Saved { date, rows: count });
            }
            self.dirty_locked(&state, date)
        };

        match result {
            Ok(()) => {
                if still_dirty {
                    self.schedule_save(date);
                }
                Ok(SaveOutcome::Saved)
            }
            Err(error) => {
                warn!(%date, %error, "save failed, local board kept");
                self.publish(SyncEvent::SaveFailed {
                    date,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Replace the board's `date` with the stored rows and mark it synced.
    ///
    /// Fails without touching the board or the sync state when a stored row
    /// addresses a cell the board cannot open.
    pub async fn load(&self, date: NaiveDate) -> Result<usize, PlanningError> {
        let stamp = self.inner.store.last_modified(date, date).await?;
        let rows = self.inner.store.list_range(date, date).await?;
        let mut state = self.inner.state.lock();
        let (revision, held) = {
            let mut board = self.inner.board.lock();
            board.replace_date(date, rows)?;
            (board.revision(date), board.rows_for(date))
        };
        state.cancel_debounce(date);
        let count = held.len();
        state.mark_synced(date, revision, held, stamp.unwrap_or(0).max(now_ms()));
        debug!(%date, rows = count, "day loaded");
        Ok(count)
    }

    /// Ask the store whether `date` changed elsewhere; reload if it did.
    pub async fn poll(&self, date: NaiveDate) -> Result<PollOutcome, PlanningError> {
        {
            let mut state = self.inner.state.lock();
            if state.saving.contains(&date) || state.polling.contains(&date) {
                return Ok(PollOutcome::Skipped);
            }
            state.polling.insert(date);
        }
        let result = self.poll_store(date).await;
        self.inner.state.lock().polling.remove(&date);
        result
    }

    async fn poll_store(&self, date: NaiveDate) -> Result<PollOutcome, PlanningError> {
        let stamp = self.inner.store.last_modified(date, date).await?;
        let remote = match stamp {
            Some(stamp) => {
                let last_sync = self.inner.state.lock().last_sync_ms.get(&date).copied();
                if last_sync.is_some_and(|synced| stamp <= synced) {
                    return Ok(PollOutcome::UpToDate);
                }
                self.inner.store.list_range(date, date).await?
            }
            None => {
                let rows = self.inner.store.list_range(date, date).await?;
                let state = self.inner.state.lock();
                let known = state.last_synced_rows.get(&date).map_or(&[][..], Vec::as_slice);
                if same_rows(known, &rows) {
                    return Ok(PollOutcome::UpToDate);
                }
                rows
            }
        };

        let discarded_local_edits = {
            let mut state = self.inner.state.lock();
            let discarded = self.dirty_locked(&state, date);
            let (revision, held) = {
                let mut board = self.inner.board.lock();
                if let Err(error) = board.replace_date(date, remote) {
                    warn!(%date, %error, "remote rows not loadable, local board kept");
                    return Err(error);
                }
                (board.revision(date), board.rows_for(date))
            };
            state.cancel_debounce(date);
            state.mark_synced(date, revision, held, stamp.unwrap_or(0).max(now_ms()));
            discarded
        };
        let notice = PlanningError::StaleRead { date }.to_string();
        warn!(%date, discarded_local_edits, "{notice}");
        self.publish(SyncEvent::ExternalUpdate {
            date,
            discarded_local_edits,
            notice,
        });
        Ok(PollOutcome::Reloaded {
            discarded_local_edits,
        })
    }

    /// Switch the active date: the previous date's timer is cancelled and its
    /// unsaved edits are flushed immediately.
    pub async fn set_active_date(&self, date: NaiveDate) -> Result<(), PlanningError> {
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = state.active_date.replace(date);
            match previous {
                Some(previous) if previous != date => {
                    state.cancel_debounce(previous);
                    self.dirty_locked(&state, previous).then_some(previous)
                }
                _ => None,
            }
        };
        if let Some(previous) = previous {
            debug!(%previous, %date, "active date switched, flushing");
            self.flush(previous).await?;
        }
        Ok(())
    }

    /// Poll the active date every `poll_interval` until the handle is aborted.
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let adapter = self.clone();
        let period = self.inner.config.poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(date) = adapter.active_date() else {
                    continue;
                };
                if let Err(error) = adapter.poll(date).await {
                    warn!(%date, %error, "poll failed");
                }
            }
        })
    }

    fn dirty_locked(&self, state: &SyncState, date: NaiveDate) -> bool {
        let revision = self.inner.board.lock().revision(date);
        state.saved_revision.get(&date).copied().unwrap_or(0) != revision
    }

    fn publish(&self, event: SyncEvent) {
        // No subscriber is fine.
        let _ = self.inner.events.send(event);
    }
}

/// Row sets are equal regardless of order.
fn same_rows(a: &[Assignment], b: &[Assignment]) -> bool {
    a.len() == b.len() && {
        let left: HashSet<&Assignment> = a.iter().collect();
        let right: HashSet<&Assignment> = b.iter().collect();
        left == right
    }
}
