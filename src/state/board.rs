//! The in-memory timer collection and its collection-wide operations
//!
//! `TimerBoard` is plain data: no locking, no I/O, no clock. `AppState`
//! wraps it with synchronization and persistence.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::timer::{Timer, TimerStatus, ValidTimer};
use crate::error::AppError;

/// Category-scoped operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Start,
    Pause,
    Reset,
}

impl FromStr for BulkAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(BulkAction::Start),
            "pause" => Ok(BulkAction::Pause),
            "reset" => Ok(BulkAction::Reset),
            other => Err(format!("unknown bulk action '{}'", other)),
        }
    }
}

/// Result of one countdown step over the whole board
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Whether any timer was modified
    pub changed: bool,
    /// Snapshots of timers that completed during this step
    pub completed: Vec<Timer>,
}

/// Timers sharing one category label, in collection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup<T = Timer> {
    pub category: String,
    pub timers: Vec<T>,
}

#[derive(Debug, Clone, Default)]
pub struct TimerBoard {
    timers: Vec<Timer>,
    last_id: u64,
    /// Bumped by every effective mutation; never persisted
    generation: u64,
}

impl TimerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a loaded collection, repairing out-of-range remaining times
    pub fn from_timers(mut timers: Vec<Timer>) -> Self {
        for timer in &mut timers {
            timer.normalize();
        }
        let last_id = timers
            .iter()
            .filter_map(|t| t.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            timers,
            last_id,
            generation: 0,
        }
    }

    /// Parse a persisted `timers` blob
    pub fn from_json(blob: &str) -> serde_json::Result<Self> {
        let timers: Vec<Timer> = serde_json::from_str(blob)?;
        Ok(Self::from_timers(timers))
    }

    /// Serialize the whole collection for the `timers` key
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.timers)
    }

    /// Replace the collection with a freshly loaded one
    pub fn replace(&mut self, loaded: TimerBoard) {
        let last_id = self.last_id.max(loaded.last_id);
        let generation = self.generation + 1;
        *self = loaded;
        self.last_id = last_id;
        self.generation = generation;
    }

    /// Counts effective mutations, so a caller that released the lock can
    /// tell whether anything changed in the meantime
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self, changed: bool) -> bool {
        if changed {
            self.generation += 1;
        }
        changed
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn get(&self, id: &str) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Append a new paused timer. Ids are the creation time in epoch
    /// milliseconds, bumped past the last issued id when the clock has not
    /// moved on.
    pub fn create(&mut self, valid: ValidTimer, now_ms: u64) -> Timer {
        let id = now_ms.max(self.last_id + 1);
        self.last_id = id;

        let timer = Timer::new(id.to_string(), valid);
        self.timers.push(timer.clone());
        self.bump(true);
        timer
    }

    pub fn start(&mut self, id: &str) -> Result<bool, AppError> {
        let changed = self.find_mut(id)?.start();
        Ok(self.bump(changed))
    }

    pub fn pause(&mut self, id: &str) -> Result<bool, AppError> {
        let changed = self.find_mut(id)?.pause();
        Ok(self.bump(changed))
    }

    pub fn reset(&mut self, id: &str) -> Result<bool, AppError> {
        let changed = self.find_mut(id)?.reset();
        Ok(self.bump(changed))
    }

    /// Apply `action` to every timer in `category`; returns how many changed
    pub fn bulk(&mut self, category: &str, action: BulkAction) -> usize {
        let changed = self
            .timers
            .iter_mut()
            .filter(|t| t.category == category)
            .map(|t| match action {
                BulkAction::Start => t.start(),
                BulkAction::Pause => t.pause(),
                BulkAction::Reset => t.reset(),
            })
            .filter(|changed| *changed)
            .count();
        self.bump(changed > 0);
        changed
    }

    /// One countdown step. Running timers lose a second; a timer that
    /// reaches zero, or was already at zero, becomes `Completed` and is
    /// reported exactly once since completed timers are never ticked again.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for timer in self.timers.iter_mut().filter(|t| t.is_running()) {
            if timer.remaining_time > 0 {
                timer.remaining_time -= 1;
                outcome.changed = true;
            }
            if timer.remaining_time == 0 {
                timer.status = TimerStatus::Completed;
                outcome.changed = true;
                outcome.completed.push(timer.clone());
            }
        }

        self.bump(outcome.changed);
        outcome
    }

    pub fn running_count(&self) -> usize {
        self.timers.iter().filter(|t| t.is_running()).count()
    }

    pub fn any_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }

    /// Category labels in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for timer in &self.timers {
            if !seen.contains(&timer.category) {
                seen.push(timer.category.clone());
            }
        }
        seen
    }

    /// Group timers by category, categories in first-appearance order
    pub fn grouped(&self) -> Vec<CategoryGroup> {
        self.categories()
            .into_iter()
            .map(|category| CategoryGroup {
                timers: self
                    .timers
                    .iter()
                    .filter(|t| t.category == category)
                    .cloned()
                    .collect(),
                category,
            })
            .collect()
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Timer, AppError> {
        self.timers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::TimerNotFound(id.to_string()))
    }
}
