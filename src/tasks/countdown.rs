//! Countdown background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

/// Period between two countdown steps
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background task that ticks running timers once per second.
///
/// The interval only exists while at least one timer is running: it is
/// dropped as soon as none are, and a fresh one is created on the next
/// transition into `Running`.
pub async fn countdown_task(state: Arc<AppState>) {
    info!("Starting countdown task");

    let mut running_rx = state.running_watch();

    loop {
        // Wait until some timer is running
        if !*running_rx.borrow_and_update() {
            if running_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        debug!("Countdown armed with {} running timers", state.running_count());
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = state.tick();
                    if report.running == 0 {
                        debug!("No timers left running after tick");
                        break;
                    }
                }

                // Timers paused or reset from outside - disarm if none remain
                changed = running_rx.changed() => {
                    if changed.is_err() {
                        info!("Countdown task stopping");
                        return;
                    }
                    if !*running_rx.borrow_and_update() {
                        debug!("All timers stopped, disarming countdown");
                        break;
                    }
                }
            }
        }
    }

    info!("Countdown task stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{StateSettings, TimerDraft, TimerStatus, ALL_CATEGORIES},
        store::MemoryStore,
    };
    use tokio::time::sleep;

    fn spawn_state() -> Arc<AppState> {
        let state = Arc::new(AppState::new(
            Arc::new(MemoryStore::new()),
            StateSettings::default(),
        ));
        tokio::spawn(countdown_task(Arc::clone(&state)));
        state
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_completes_once() {
        let state = spawn_state();
        let timer = state
            .create_timer(&TimerDraft::new("Pushups", 3, "Workout"))
            .unwrap();
        state.start_timer(&timer.id).unwrap();

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(state.timer(&timer.id).unwrap().remaining_time, 2);

        sleep(Duration::from_secs(2)).await;
        let done = state.timer(&timer.id).unwrap();
        assert_eq!(done.status, TimerStatus::Completed);
        assert_eq!(done.remaining_time, 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(state.history(ALL_CATEGORIES).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_stops_the_countdown() {
        let state = spawn_state();
        let timer = state
            .create_timer(&TimerDraft::new("Read", 60, "Study"))
            .unwrap();
        state.start_timer(&timer.id).unwrap();

        sleep(Duration::from_millis(2_500)).await;
        state.pause_timer(&timer.id).unwrap();
        let paused_at = state.timer(&timer.id).unwrap().remaining_time;
        assert_eq!(paused_at, 58);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(state.timer(&timer.id).unwrap().remaining_time, paused_at);

        // re-armed fresh: first step a full period after starting again
        state.start_timer(&timer.id).unwrap();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(state.timer(&timer.id).unwrap().remaining_time, paused_at);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(state.timer(&timer.id).unwrap().remaining_time, paused_at - 1);
    }
}
