//! Completion history records and queries over them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timer::Timer;

/// Category selector that matches every record
pub const ALL_CATEGORIES: &str = "All";

/// Snapshot of a timer taken when it completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTimerRecord {
    pub id: String,
    pub name: String,
    pub duration: u64,
    pub category: String,
    pub completed_time: DateTime<Utc>,
}

impl CompletedTimerRecord {
    pub fn from_timer(timer: &Timer, completed_time: DateTime<Utc>) -> Self {
        Self {
            id: timer.id.clone(),
            name: timer.name.clone(),
            duration: timer.duration,
            category: timer.category.clone(),
            completed_time,
        }
    }
}

/// Append-only completion log, kept in the order completions happened
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    records: Vec<CompletedTimerRecord>,
    /// Bumped by every append, clear or discard; never persisted
    generation: u64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CompletedTimerRecord>) -> Self {
        Self {
            records,
            generation: 0,
        }
    }

    /// Parse a persisted `history` blob
    pub fn from_json(blob: &str) -> serde_json::Result<Self> {
        Ok(Self::from_records(serde_json::from_str(blob)?))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }

    /// Append a record for `timer` and return it
    pub fn record(&mut self, timer: &Timer, at: DateTime<Utc>) -> CompletedTimerRecord {
        let record = CompletedTimerRecord::from_timer(timer, at);
        self.records.push(record.clone());
        self.generation += 1;
        record
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.generation += 1;
    }

    /// Drop the `count` oldest-appended records, keeping later appends
    pub fn discard_first(&mut self, count: usize) {
        self.records.drain(..count.min(self.records.len()));
        self.generation += 1;
    }

    /// Adopt a freshly loaded log, keeping the generation moving forward
    pub fn replace(&mut self, loaded: HistoryLog) {
        let generation = self.generation + 1;
        *self = loaded;
        self.generation = generation;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with the most recent completion first
    pub fn newest_first(&self) -> Vec<CompletedTimerRecord> {
        let mut records = self.records.clone();
        sort_newest_first(&mut records);
        records
    }
}

/// Stable sort by completion time, most recent first
pub fn sort_newest_first(records: &mut [CompletedTimerRecord]) {
    records.sort_by(|a, b| b.completed_time.cmp(&a.completed_time));
}

/// Records matching `category`, or all of them for the `All` selector.
/// Order is preserved.
pub fn filter_by_category(
    records: &[CompletedTimerRecord],
    category: &str,
) -> Vec<CompletedTimerRecord> {
    if category == ALL_CATEGORIES {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.category == category)
        .cloned()
        .collect()
}

/// Distinct categories in order of first appearance
pub fn distinct_categories(records: &[CompletedTimerRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        if !seen.contains(&record.category) {
            seen.push(record.category.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::timer::{TimerDraft, TimerStatus};
    use chrono::TimeZone;

    fn timer(id: &str, category: &str) -> Timer {
        let valid = TimerDraft::new(format!("timer {}", id), 10, category)
            .validate()
            .unwrap();
        let mut t = Timer::new(id.to_string(), valid);
        t.status = TimerStatus::Completed;
        t.remaining_time = 0;
        t
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample() -> Vec<CompletedTimerRecord> {
        let mut log = HistoryLog::new();
        log.record(&timer("1", "Study"), at(10));
        log.record(&timer("2", "Workout"), at(30));
        log.record(&timer("3", "Study"), at(20));
        log.newest_first()
    }

    #[test]
    fn newest_first_orders_by_completion_time() {
        let ids: Vec<_> = sample().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[test]
    fn all_selector_is_identity() {
        let records = sample();
        assert_eq!(filter_by_category(&records, ALL_CATEGORIES), records);
    }

    #[test]
    fn filter_keeps_order_of_matching_records() {
        let records = sample();
        let study: Vec<_> = filter_by_category(&records, "Study")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(study, vec!["3", "1"]);
        assert!(filter_by_category(&records, "Break").is_empty());
    }

    #[test]
    fn categories_follow_first_appearance() {
        assert_eq!(distinct_categories(&sample()), vec!["Workout", "Study"]);
    }

    #[test]
    fn record_copies_timer_fields() {
        let mut log = HistoryLog::new();
        let record = log.record(&timer("7", "Break"), at(0));
        assert_eq!(record.id, "7");
        assert_eq!(record.duration, 10);
        assert_eq!(record.category, "Break");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn discard_first_keeps_later_appends() {
        let mut log = HistoryLog::new();
        log.record(&timer("1", "Study"), at(0));
        log.record(&timer("2", "Study"), at(1));
        log.record(&timer("3", "Break"), at(2));
        let before = log.generation();

        log.discard_first(2);
        let ids: Vec<_> = log.newest_first().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["3"]);
        assert!(log.generation() > before);

        log.discard_first(10);
        assert!(log.is_empty());
    }

    #[test]
    fn loads_records_with_extra_fields() {
        let blob = r#"[{"id":"1","name":"x","duration":5,"remainingTime":0,"status":"Completed","category":"Study","completedTime":"2024-05-01T10:00:00.000Z"}]"#;
        let log = HistoryLog::from_json(blob).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.newest_first()[0].category, "Study");
    }

    #[test]
    fn persisted_shape() {
        let mut log = HistoryLog::new();
        log.record(&timer("1", "Study"), at(0));
        let json: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        let first = &json[0];
        assert_eq!(first["id"], "1");
        assert!(first["completedTime"].as_str().unwrap().starts_with("2023-11-14T"));
        assert!(first.get("remainingTime").is_none());
    }
}
