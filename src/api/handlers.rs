//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    services::ExportOutcome,
    state::{
        ActivationReport, AppState, BulkAction, CategoryGroup, TimerDraft, TimerEvent,
        TimerView, Transition, ALL_CATEGORIES, OTHER_CATEGORY, PREDEFINED_CATEGORIES,
    },
};
use super::responses::{
    ApiError, ApiResponse, BulkResult, CategoriesResponse, HealthResponse, HistoryResponse,
    StatusResponse, TimersResponse,
};

/// Optional `?category=` selector
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

/// Handle GET /timers - Timers grouped by category
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Json<TimersResponse> {
    let groups = state
        .grouped_timers()
        .into_iter()
        .map(|group| CategoryGroup {
            category: group.category,
            timers: group.timers.into_iter().map(TimerView::from).collect(),
        })
        .collect();

    Json(TimersResponse {
        groups,
        running: state.running_count(),
    })
}

/// Handle GET /timers/stream - Snapshots and completion notices as SSE
pub async fn timer_stream_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    // Subscribe before taking the first snapshot so nothing falls in between
    let rx = state.subscribe();
    let initial = TimerEvent::Snapshot {
        timers: state.timers(),
    };
    debug!("Timer stream opened");

    let updates = stream::unfold((rx, state), |(mut rx, state)| async move {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Timer stream fell {} events behind, resending snapshot", skipped);
                TimerEvent::Snapshot {
                    timers: state.timers(),
                }
            }
            Err(RecvError::Closed) => return None,
        };
        Some((event, (rx, state)))
    });

    let events = stream::once(async move { initial })
        .chain(updates)
        .map(|event| Event::default().event(event.name()).json_data(&event));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle POST /timers - Add a timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TimerDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TimerView>>), ApiError> {
    let Json(draft) = payload?;
    let timer = state.create_timer(&draft)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Timer saved", TimerView::from(timer))),
    ))
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TimerView>>, ApiError> {
    let transition = state.start_timer(&id)?;
    Ok(transition_response(transition, "Timer started", "Timer is already running or completed"))
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TimerView>>, ApiError> {
    let transition = state.pause_timer(&id)?;
    Ok(transition_response(transition, "Timer paused", "Timer is not running"))
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TimerView>>, ApiError> {
    let transition = state.reset_timer(&id)?;
    Ok(transition_response(transition, "Timer reset", "Timer is already reset"))
}

fn transition_response(
    transition: Transition,
    done: &str,
    unchanged: &str,
) -> Json<ApiResponse<TimerView>> {
    let view = TimerView::from(transition.timer);
    if transition.changed {
        Json(ApiResponse::ok(done, view))
    } else {
        Json(ApiResponse::no_change(unchanged, view))
    }
}

/// Handle POST /categories/:category/:action - Bulk start, pause or reset
pub async fn bulk_action_handler(
    State(state): State<Arc<AppState>>,
    Path((category, action)): Path<(String, String)>,
) -> Result<Json<ApiResponse<BulkResult>>, ApiError> {
    let parsed: BulkAction = action.parse().map_err(ApiError::BadRequest)?;
    let changed = state.bulk_action(&category, parsed);

    Ok(Json(ApiResponse::ok(
        format!("{} timers updated in {}", changed, category),
        BulkResult {
            category,
            action: action.to_ascii_lowercase(),
            changed,
        },
    )))
}

/// Handle GET /categories - Predefined and in-use categories
pub async fn categories_handler(State(state): State<Arc<AppState>>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        predefined: PREDEFINED_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        in_use: state
            .timer_categories()
            .into_iter()
            .filter(|c| c != OTHER_CATEGORY)
            .collect(),
    })
}

/// Handle POST /activate - Reload timers and history from the store
pub async fn activate_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ActivationReport>> {
    let report = state.activate().await;
    if report.warnings.is_empty() {
        Json(ApiResponse::ok("Reloaded from store", report))
    } else {
        warn!("Activation finished with warnings: {:?}", report.warnings);
        Json(ApiResponse::new("degraded", "Reloaded with warnings", report))
    }
}

/// Handle GET /history - Newest-first history, optionally filtered
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Json<HistoryResponse> {
    let category = query.category.unwrap_or_else(|| ALL_CATEGORIES.to_string());
    let records = state.history(&category);
    Json(HistoryResponse { category, records })
}

/// Handle GET /history/categories - Filter options, `All` first
pub async fn history_categories_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let mut options = vec![ALL_CATEGORIES.to_string()];
    options.extend(state.history_categories());
    Json(options)
}

/// Handle DELETE /history - Clear all history
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.clear_history().await?;
    Ok(Json(ApiResponse::ok("History cleared", ())))
}

/// Handle POST /history/export - Write history to the export directory
pub async fn export_history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<ApiResponse<ExportOutcome>>, ApiError> {
    let outcome = state.export_history(query.category.as_deref()).await?;
    match &outcome {
        ExportOutcome::NothingToExport => Ok(Json(ApiResponse::no_data(
            "There is no history to export",
            outcome,
        ))),
        ExportOutcome::Written { path, .. } => {
            info!("History exported to {}", path.display());
            let message = format!("File saved to {}", path.display());
            Ok(Json(ApiResponse::ok(message, outcome)))
        }
    }
}

/// Handle GET /status - Return current service status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    let running = state.running_count();

    Json(StatusResponse {
        timers: state.timers().len(),
        running,
        countdown_armed: *state.running_watch().borrow(),
        history: state.history(ALL_CATEGORIES).len(),
        notices: state.notices(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
