//! State management module
//! 
//! This module contains the timer and history collections and the
//! `AppState` that owns them.

pub mod app_state;
pub mod board;
pub mod history;
pub mod notices;
pub mod timer;

// Re-export main types
pub use app_state::{
    ActivationReport, AppState, Loaded, StateSettings, TickReport, TimerEvent, Transition,
};
pub use board::{BulkAction, CategoryGroup, TickOutcome, TimerBoard};
pub use history::{
    distinct_categories, filter_by_category, CompletedTimerRecord, HistoryLog, ALL_CATEGORIES,
};
pub use notices::{Notice, NoticeBoard};
pub use timer::{
    format_clock, DurationInput, Timer, TimerDraft, TimerStatus, TimerView, ValidTimer, OTHER_CATEGORY,
    PREDEFINED_CATEGORIES,
};
