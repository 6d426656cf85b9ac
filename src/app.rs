use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::dispatch::SlotOutcome;
use crate::editor::EditorBackend;
use crate::error::DataLoadError;
use crate::scheduler::ClearOutcome;

/// Cookie naming the caller's sheet view session
pub const SESSION_COOKIE: &str = "dashboard_session";

pub struct AppState {
    pub dashboard: Dashboard,
    pub editor: Arc<EditorBackend>,
    pub config: DashboardConfig,
}

impl AppState {
    /// Wires the standard dashboard to a fresh sheet view backend
    pub fn new(config: DashboardConfig) -> Self {
        let editor = Arc::new(EditorBackend::new());
        let dashboard = Dashboard::from_config(&config, editor.clone());
        AppState {
            dashboard,
            editor,
            config,
        }
    }
}

/// Builds the dashboard router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/slots", get(get_slots))
        .route("/api/preview", get(get_preview))
        .route("/api/sheet", get(get_sheet))
        .route("/api/config", get(get_config))
        .route("/api/reload", post(reload_dataset))
        .route("/chart/:id", get(get_chart))
        .with_state(state)
}

/// Starts the web server
///
/// # Arguments
/// * `config` - Deployment settings; `bind_addr` decides where to listen
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Ok once the server stops, or
///   the bind/serve error
pub async fn run(config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let app = router(Arc::new(AppState::new(config)));

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// File parsing and chart drawing block, so full renders run off the async workers
async fn serve_dashboard(State(state): State<Arc<AppState>>) -> Response {
    match tokio::task::spawn_blocking(move || state.dashboard.render_html()).await {
        Ok(page) => Html(page).into_response(),
        Err(err) => task_failed(err),
    }
}

async fn get_slots(State(state): State<Arc<AppState>>) -> Response {
    let rendered = match tokio::task::spawn_blocking(move || state.dashboard.render()).await {
        Ok(rendered) => rendered,
        Err(err) => return task_failed(err),
    };

    match rendered {
        Ok(rendered) => {
            let slots: Vec<_> = rendered.slots.iter().map(|slot| slot.summary()).collect();
            let cache = match &rendered.cache {
                Ok(ClearOutcome::Cleared { at }) => serde_json::json!({
                    "status": "cleared",
                    "at": at,
                }),
                Ok(ClearOutcome::Cooling { next_due }) => serde_json::json!({
                    "status": "cooling",
                    "next_due": next_due,
                }),
                Err(err) => serde_json::json!({
                    "status": "failed",
                    "message": err.to_string(),
                }),
            };
            Json(serde_json::json!({
                "rows": rendered.dataset.row_count(),
                "columns": rendered.dataset.schema().names(),
                "slots": slots,
                "cache": cache,
            }))
            .into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn get_preview(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard.loader().load() {
        Ok(dataset) => Json(serde_json::json!({
            "total_rows": dataset.row_count(),
            "preview": dataset.head(state.dashboard.preview_rows()),
        }))
        .into_response(),
        Err(err) => error_response(&err),
    }
}

async fn get_sheet(jar: CookieJar, State(state): State<Arc<AppState>>) -> Response {
    let dataset = match state.dashboard.loader().load() {
        Ok(dataset) => dataset,
        Err(err) => return error_response(&err),
    };

    let (jar, session) = match jar.get(SESSION_COOKIE) {
        Some(cookie) => {
            let session = cookie.value().to_string();
            (jar, session)
        }
        None => {
            let session = uuid::Uuid::new_v4().to_string();
            let mut cookie = Cookie::new(SESSION_COOKIE, session.clone());
            cookie.set_path("/");
            cookie.set_http_only(true);
            (jar.add(cookie), session)
        }
    };

    let grid = state.editor.snapshot(&session, &dataset);
    (jar, Json(grid.as_ref().clone())).into_response()
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<DashboardConfig> {
    Json(state.config.clone())
}

async fn reload_dataset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.dashboard.loader().invalidate();
    log::info!("dataset memo dropped by reload request");
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let slot = match state.dashboard.render_slot(&id) {
        Ok(Some(slot)) => slot,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, format!("No chart slot named '{}'", id)).into_response();
        }
        Err(err) => return error_response(&err),
    };

    match slot.outcome {
        SlotOutcome::Chart(chart) => {
            ([(header::CONTENT_TYPE, "image/svg+xml")], chart.svg).into_response()
        }
        SlotOutcome::MissingColumns { message, .. } => {
            (StatusCode::NOT_FOUND, message).into_response()
        }
        SlotOutcome::RenderFailed(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn task_failed(err: tokio::task::JoinError) -> Response {
    log::error!("render task failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "render task failed").into_response()
}

fn error_response(err: &DataLoadError) -> Response {
    log::error!("dashboard request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "status": "error",
            "message": err.to_string(),
        })),
    )
        .into_response()
}
