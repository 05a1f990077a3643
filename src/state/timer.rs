//! Timer model and single-timer transitions

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Categories offered when adding a timer
pub const PREDEFINED_CATEGORIES: [&str; 4] = ["Workout", "Study", "Break", OTHER_CATEGORY];

/// Picking this category means "use the custom category instead"
pub const OTHER_CATEGORY: &str = "Other";

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    Paused,
    Running,
    Completed,
}

/// A named countdown, as persisted under the `timers` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: String,
    pub name: String,
    pub duration: u64,
    pub remaining_time: u64,
    pub category: String,
    pub status: TimerStatus,
}

impl Timer {
    /// A fresh timer: paused, with its full duration remaining
    pub fn new(id: String, valid: ValidTimer) -> Self {
        Self {
            id,
            name: valid.name,
            duration: valid.duration,
            remaining_time: valid.duration,
            category: valid.category,
            status: TimerStatus::Paused,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Paused -> Running. Returns whether anything changed.
    pub fn start(&mut self) -> bool {
        if self.status == TimerStatus::Paused {
            self.status = TimerStatus::Running;
            true
        } else {
            false
        }
    }

    /// Running -> Paused. Returns whether anything changed.
    pub fn pause(&mut self) -> bool {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Any state -> Paused with the full duration restored
    pub fn reset(&mut self) -> bool {
        let changed = self.status != TimerStatus::Paused || self.remaining_time != self.duration;
        self.status = TimerStatus::Paused;
        self.remaining_time = self.duration;
        changed
    }

    /// Enforce `remaining_time <= duration` on data read from the store
    pub(crate) fn normalize(&mut self) {
        if self.remaining_time > self.duration {
            self.remaining_time = self.duration;
        }
    }

    /// Fraction of the duration still remaining, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        self.remaining_time as f64 / self.duration as f64
    }
}

/// Duration as submitted. Clients send numbers or numeric text; anything
/// that is not a whole number of seconds is rejected by `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

impl Default for DurationInput {
    fn default() -> Self {
        DurationInput::Seconds(0)
    }
}

impl From<i64> for DurationInput {
    fn from(seconds: i64) -> Self {
        DurationInput::Seconds(seconds)
    }
}

impl DurationInput {
    /// Whole seconds, if the input denotes an integer
    fn whole_seconds(&self) -> Result<i64, ValidationError> {
        match self {
            DurationInput::Seconds(seconds) => Ok(*seconds),
            DurationInput::Fractional(value) => {
                if value.is_finite()
                    && value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value <= i64::MAX as f64
                {
                    Ok(*value as i64)
                } else {
                    Err(ValidationError::NotWholeSeconds(value.to_string()))
                }
            }
            DurationInput::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::NotWholeSeconds(text.clone())),
        }
    }
}

/// Input of the add-timer intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDraft {
    pub name: String,
    pub duration: DurationInput,
    pub category: String,
    #[serde(default)]
    pub custom_category: Option<String>,
}

/// A draft that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTimer {
    pub name: String,
    pub duration: u64,
    pub category: String,
}

impl TimerDraft {
    pub fn new(name: impl Into<String>, duration: i64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: DurationInput::Seconds(duration),
            category: category.into(),
            custom_category: None,
        }
    }

    pub fn validate(&self) -> Result<ValidTimer, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let duration = self.duration.whole_seconds()?;
        if duration <= 0 {
            return Err(ValidationError::NonPositiveDuration(duration));
        }

        let category = if self.category.trim() == OTHER_CATEGORY {
            self.custom_category.as_deref().unwrap_or("").trim()
        } else {
            self.category.trim()
        };
        if category.is_empty() {
            return Err(ValidationError::EmptyCategory);
        }

        Ok(ValidTimer {
            name: name.to_string(),
            duration: duration as u64,
            category: category.to_string(),
        })
    }
}

/// Clock text for a number of seconds: `MM:SS`, or `H:MM:SS` past an hour
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// A timer plus the derived values clients render
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    pub display: String,
    pub progress: f64,
}

impl From<Timer> for TimerView {
    fn from(timer: Timer) -> Self {
        Self {
            display: format_clock(timer.remaining_time),
            progress: timer.progress(),
            timer,
        }
    }
}
