//! Main application state management

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::{
    board::{BulkAction, CategoryGroup, TimerBoard},
    history::{distinct_categories, filter_by_category, CompletedTimerRecord, HistoryLog, ALL_CATEGORIES},
    notices::{Notice, NoticeBoard},
    timer::{Timer, TimerDraft},
};
use crate::{
    error::{AppError, Result},
    services::{write_history_export, ExportOutcome},
    store::{KeyValueStore, PersistWriter, WriteOp, HISTORY_KEY, TIMERS_KEY},
};

/// Settings the state needs from the outside world
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub port: u16,
    pub host: String,
    /// Where history exports are written
    pub export_dir: PathBuf,
    /// Quiet period before a queued write hits the store
    pub write_debounce: Duration,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            export_dir: PathBuf::from("."),
            write_debounce: Duration::ZERO,
        }
    }
}

/// Outcome of one countdown step
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// History records created by this step
    pub completed: Vec<CompletedTimerRecord>,
    /// Timers still running afterwards
    pub running: usize,
}

/// A value loaded from the store, plus the recoverable error hit on the way
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub error: Option<AppError>,
}

/// Outcome of a single-timer intent
#[derive(Debug, Clone)]
pub struct Transition {
    pub timer: Timer,
    /// False when the intent was a no-op for the timer's current status
    pub changed: bool,
}

/// What observers of the timer collection receive
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerEvent {
    /// The whole collection after a committed change
    Snapshot { timers: Vec<Timer> },
    /// A timer counted down to zero
    Completed {
        record: CompletedTimerRecord,
        message: String,
    },
}

impl TimerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::Snapshot { .. } => "snapshot",
            TimerEvent::Completed { .. } => "completed",
        }
    }
}

/// Reads that raced a mutation are retried this many times before the
/// in-memory collection is kept as the newer one
const RELOAD_ATTEMPTS: usize = 3;

/// Result of reloading both collections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationReport {
    pub timers: usize,
    pub history: usize,
    pub warnings: Vec<String>,
}

/// Owns the timer collection and the completion history, and is the only
/// writer of their store keys.
///
/// Must be constructed inside a Tokio runtime: the per-key writers are
/// spawned as background tasks.
pub struct AppState {
    board: Mutex<TimerBoard>,
    history: Mutex<HistoryLog>,
    store: Arc<dyn KeyValueStore>,
    timers_writer: PersistWriter,
    history_writer: PersistWriter,
    notices: NoticeBoard,
    export_dir: PathBuf,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<String>>,
    last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Whole-collection snapshots, one per committed mutation, and
    /// completion notices
    change_tx: broadcast::Sender<TimerEvent>,
    /// Whether any timer is running; drives the countdown task
    running_tx: watch::Sender<bool>,
}

impl AppState {
    /// Create an empty state backed by `store`. Call `activate` to load.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: StateSettings) -> Self {
        let notices = NoticeBoard::new();
        let timers_writer = PersistWriter::spawn(
            Arc::clone(&store),
            TIMERS_KEY,
            settings.write_debounce,
            notices.clone(),
        );
        let history_writer = PersistWriter::spawn(
            Arc::clone(&store),
            HISTORY_KEY,
            settings.write_debounce,
            notices.clone(),
        );
        let (change_tx, _) = broadcast::channel(64);
        let (running_tx, _) = watch::channel(false);

        Self {
            board: Mutex::new(TimerBoard::new()),
            history: Mutex::new(HistoryLog::new()),
            store,
            timers_writer,
            history_writer,
            notices,
            export_dir: settings.export_dir,
            start_time: Instant::now(),
            port: settings.port,
            host: settings.host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            change_tx,
            running_tx,
        }
    }

    fn board(&self) -> MutexGuard<'_, TimerBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history_log(&self) -> MutexGuard<'_, HistoryLog> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Timer intents ────────────────────────────────────────────────

    /// Validate `draft` and append a new paused timer
    pub fn create_timer(&self, draft: &TimerDraft) -> Result<Timer> {
        let valid = draft.validate()?;
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;

        let timer = self.mutate_board("create", |board| Ok((board.create(valid, now_ms), true)))?;
        info!("Created timer {} '{}' ({}s, {})", timer.id, timer.name, timer.duration, timer.category);
        Ok(timer)
    }

    pub fn start_timer(&self, id: &str) -> Result<Transition> {
        self.single_timer("start", id, |board| board.start(id))
    }

    pub fn pause_timer(&self, id: &str) -> Result<Transition> {
        self.single_timer("pause", id, |board| board.pause(id))
    }

    pub fn reset_timer(&self, id: &str) -> Result<Transition> {
        self.single_timer("reset", id, |board| board.reset(id))
    }

    /// Apply a category-wide action; returns how many timers changed
    pub fn bulk_action(&self, category: &str, action: BulkAction) -> usize {
        let changed = self
            .mutate_board("bulk", |board| {
                let changed = board.bulk(category, action);
                Ok((changed, changed > 0))
            })
            .unwrap_or(0);
        info!("Bulk {:?} on category '{}' changed {} timers", action, category, changed);
        changed
    }

    /// One countdown step over every running timer, committed as a single
    /// batch. Completions are recorded into history while the board is
    /// still locked (lock order: board, then history), so no reader sees a
    /// completed timer without its record.
    pub fn tick(&self) -> TickReport {
        let mut board = self.board();
        let outcome = board.tick();
        let running = board.running_count();

        if !outcome.changed {
            return TickReport {
                completed: Vec::new(),
                running,
            };
        }

        self.persist_timers(&board);
        let completed: Vec<CompletedTimerRecord> = outcome
            .completed
            .iter()
            .map(|timer| self.record_completion(timer))
            .collect();
        let snapshot = board.timers().to_vec();
        drop(board);

        debug!("Tick applied: {} running, {} completed", running, completed.len());
        self.publish(snapshot, running > 0);
        for record in &completed {
            self.announce(TimerEvent::Completed {
                message: format!("Congratulations! You completed {}", record.name),
                record: record.clone(),
            });
        }

        TickReport { completed, running }
    }

    fn single_timer<F>(&self, action: &str, id: &str, op: F) -> Result<Transition>
    where
        F: FnOnce(&mut TimerBoard) -> Result<bool>,
    {
        let transition = self.mutate_board(action, |board| {
            let changed = op(board)?;
            let timer = board
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::TimerNotFound(id.to_string()))?;
            Ok((Transition { timer, changed }, changed))
        })?;

        if transition.changed {
            info!("Timer {} {} -> {:?}", id, action, transition.timer.status);
        } else {
            debug!("Timer {} {} ignored in status {:?}", id, action, transition.timer.status);
        }
        Ok(transition)
    }

    /// Run `op` under the board lock. When it reports a change, the new
    /// collection is queued for persistence before the lock is released,
    /// so writes are issued in mutation order.
    fn mutate_board<R, F>(&self, action: &str, op: F) -> Result<R>
    where
        F: FnOnce(&mut TimerBoard) -> Result<(R, bool)>,
    {
        let mut board = self.board();
        let (value, changed) = op(&mut board)?;

        if changed {
            self.persist_timers(&board);
            let snapshot = board.timers().to_vec();
            let any_running = board.any_running();
            drop(board);

            self.publish(snapshot, any_running);
            self.note_action(action);
        }

        Ok(value)
    }

    fn persist_timers(&self, board: &TimerBoard) {
        match board.to_json() {
            Ok(blob) => {
                self.timers_writer.issue(WriteOp::Put(blob));
            }
            Err(e) => {
                error!("Failed to serialize timers: {}", e);
                self.notices.push(TIMERS_KEY, format!("Failed to serialize timers: {}", e));
            }
        }
    }

    fn publish(&self, snapshot: Vec<Timer>, any_running: bool) {
        self.running_tx.send_if_modified(|running| {
            if *running != any_running {
                *running = any_running;
                true
            } else {
                false
            }
        });

        self.announce(TimerEvent::Snapshot { timers: snapshot });
    }

    fn announce(&self, event: TimerEvent) {
        // No subscribers is the common case
        if self.change_tx.send(event).is_err() {
            debug!("No timer observers subscribed");
        }
    }

    fn note_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    // ── Timer queries ────────────────────────────────────────────────

    pub fn timers(&self) -> Vec<Timer> {
        self.board().timers().to_vec()
    }

    pub fn timer(&self, id: &str) -> Option<Timer> {
        self.board().get(id).cloned()
    }

    /// Timers grouped by category, recomputed from the live collection
    pub fn grouped_timers(&self) -> Vec<CategoryGroup> {
        self.board().grouped()
    }

    /// Category labels currently carried by timers
    pub fn timer_categories(&self) -> Vec<String> {
        self.board().categories()
    }

    pub fn running_count(&self) -> usize {
        self.board().running_count()
    }

    /// Observe every committed change as a whole-collection snapshot, plus
    /// a notice per completion
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.change_tx.subscribe()
    }

    /// Observe whether any timer is running
    pub fn running_watch(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }

    // ── History ──────────────────────────────────────────────────────

    /// Append a completion record for `timer` and queue the history write
    pub fn record_completion(&self, timer: &Timer) -> CompletedTimerRecord {
        let mut history = self.history_log();
        let record = history.record(timer, Utc::now());
        self.persist_history(&history);
        drop(history);

        info!("Timer {} '{}' completed ({})", record.id, record.name, record.category);
        record
    }

    fn persist_history(&self, history: &HistoryLog) {
        match history.to_json() {
            Ok(blob) => {
                self.history_writer.issue(WriteOp::Put(blob));
            }
            Err(e) => {
                error!("Failed to serialize history: {}", e);
                self.notices.push(HISTORY_KEY, format!("Failed to serialize history: {}", e));
            }
        }
    }

    /// Newest-first history, filtered by category (`All` for everything)
    pub fn history(&self, category: &str) -> Vec<CompletedTimerRecord> {
        let records = self.history_log().newest_first();
        filter_by_category(&records, category)
    }

    /// Filter options for the history view
    pub fn history_categories(&self) -> Vec<String> {
        distinct_categories(&self.history_log().newest_first())
    }

    /// Remove the history key, then empty the in-memory history. The
    /// removal goes through the same writer as appends, so no earlier write
    /// can land after it. When the removal fails the records stay in memory
    /// and are written back so store and memory agree.
    pub async fn clear_history(&self) -> Result<()> {
        let (cleared, generation) = {
            let history = self.history_log();
            self.history_writer.issue(WriteOp::Remove);
            (history.len(), history.generation())
        };

        if let Err(e) = self.history_writer.flush().await {
            let history = self.history_log();
            self.persist_history(&history);
            warn!("History not cleared, keeping {} records: {}", history.len(), e);
            return Err(e);
        }

        {
            let mut history = self.history_log();
            if history.generation() == generation {
                history.clear();
            } else {
                // completions recorded while the removal was in flight
                history.discard_first(cleared);
                self.persist_history(&history);
            }
        }
        self.note_action("clear-history");
        info!("History cleared ({} records)", cleared);
        Ok(())
    }

    /// Export the history (optionally one category) to the export directory
    pub async fn export_history(&self, category: Option<&str>) -> Result<ExportOutcome> {
        let records = self.history(category.unwrap_or(ALL_CATEGORIES));

        match write_history_export(&self.export_dir, &records, Utc::now()).await {
            Ok(outcome) => {
                self.notices.clear_for("export");
                self.note_action("export");
                Ok(outcome)
            }
            Err(e) => {
                self.notices.push(e.component(), e.to_string());
                Err(e)
            }
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Reload both collections from the store. Called at startup and
    /// whenever a client comes back to the foreground.
    pub async fn activate(&self) -> ActivationReport {
        let mut report = ActivationReport::default();

        match self.reload_timers().await {
            Ok(count) => report.timers = count,
            Err(e) => report.warnings.push(e.to_string()),
        }

        let history = self.load_history().await;
        report.history = history.value.len();
        if let Some(e) = history.error {
            report.warnings.push(e.to_string());
        }

        info!(
            "Activated: {} timers, {} history records, {} warnings",
            report.timers,
            report.history,
            report.warnings.len()
        );
        report
    }

    /// Replace the in-memory timers with the stored collection, as stored.
    /// A read failure keeps the in-memory collection; malformed data is
    /// replaced by an empty collection.
    ///
    /// The read happens without the board lock, so it is only installed if
    /// no mutation landed in the meantime. Otherwise the pending write is
    /// flushed and the key read again.
    pub async fn reload_timers(&self) -> Result<usize> {
        for attempt in 1..=RELOAD_ATTEMPTS {
            let generation = self.board().generation();
            if let Err(e) = self.timers_writer.flush().await {
                warn!("Pending timer write failed before reload: {}", e);
            }
            let loaded = self.read_collection(TIMERS_KEY, TimerBoard::from_json).await;

            let mut board = self.board();
            if board.generation() != generation {
                debug!("Timers changed during reload attempt {}, reading again", attempt);
                continue;
            }

            let result = match loaded {
                Ok(loaded) => {
                    let count = loaded.len();
                    board.replace(loaded);
                    Ok(count)
                }
                Err(e) => {
                    self.notices.push(TIMERS_KEY, e.to_string());
                    if !matches!(e, AppError::Parse { .. }) {
                        return Err(e);
                    }
                    board.replace(TimerBoard::new());
                    Err(e)
                }
            };

            let snapshot = board.timers().to_vec();
            let any_running = board.any_running();
            drop(board);
            self.publish(snapshot, any_running);
            return result;
        }

        let count = self.board().len();
        warn!("Timers kept changing during reload; keeping {} in-memory timers", count);
        Ok(count)
    }

    /// Reload history from the store and return it newest-first. Fails
    /// softly: on error the returned sequence is empty and the error is
    /// handed back alongside it.
    /// Like `reload_timers`, a read that raced a new record is retried.
    pub async fn load_history(&self) -> Loaded<Vec<CompletedTimerRecord>> {
        for attempt in 1..=RELOAD_ATTEMPTS {
            let generation = self.history_log().generation();
            if let Err(e) = self.history_writer.flush().await {
                warn!("Pending history write failed before reload: {}", e);
            }
            let loaded = self.read_collection(HISTORY_KEY, HistoryLog::from_json).await;

            let mut history = self.history_log();
            if history.generation() != generation {
                debug!("History changed during reload attempt {}, reading again", attempt);
                continue;
            }

            return match loaded {
                Ok(log) => {
                    let records = log.newest_first();
                    history.replace(log);
                    Loaded {
                        value: records,
                        error: None,
                    }
                }
                Err(e) => {
                    self.notices.push(HISTORY_KEY, e.to_string());
                    if matches!(e, AppError::Parse { .. }) {
                        history.replace(HistoryLog::new());
                    }
                    Loaded {
                        value: Vec::new(),
                        error: Some(e),
                    }
                }
            };
        }

        let records = self.history_log().newest_first();
        warn!("History kept changing during reload; keeping {} in-memory records", records.len());
        Loaded {
            value: records,
            error: None,
        }
    }

    async fn read_collection<T: Default>(
        &self,
        key: &'static str,
        parse: fn(&str) -> serde_json::Result<T>,
    ) -> Result<T> {
        let blob = self
            .store
            .get(key)
            .await
            .map_err(|source| AppError::StorageRead {
                key: key.to_string(),
                source,
            })?;

        match blob {
            Some(blob) => parse(&blob).map_err(|source| AppError::Parse {
                key: key.to_string(),
                source,
            }),
            None => Ok(T::default()),
        }
    }

    /// Wait for every queued write to reach the store
    pub async fn flush(&self) -> Result<()> {
        let timers = self.timers_writer.flush().await;
        let history = self.history_writer.flush().await;
        timers.and(history)
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.list()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
