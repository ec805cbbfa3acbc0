//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::config::DisplayConfig;
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_tracker_core::{
    ChartSeries, CommentEntry, CommentSubmission, Dashboard, ProgressPoint, ProgressSummary,
    ServiceError, StudySubmission,
};
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_dashboard_handler,
        get_study_handler,
        get_comments_handler,
        post_comment_handler,
        post_study_handler,
        crate::web::charts::daily_chart_handler,
        crate::web::charts::cumulative_chart_handler,
    ),
    components(
        schemas(
            DashboardResponse,
            StudyLogResponse,
            GuestbookResponse,
            CommentRequest,
            StudyRequest,
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Reading progress toward a page goal, plus a public guestbook of whips.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DisplayResponse {
    pub site_title: String,
    pub book_title: String,
    pub book_author: String,
}

impl From<&DisplayConfig> for DisplayResponse {
    fn from(display: &DisplayConfig) -> Self {
        Self {
            site_title: display.site_title.clone(),
            book_title: display.book_title.clone(),
            book_author: display.book_author.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub goal: f64,
    pub done: f64,
    pub percent: f64,
    pub remaining: f64,
}

impl From<ProgressSummary> for SummaryResponse {
    fn from(summary: ProgressSummary) -> Self {
        Self {
            goal: summary.goal,
            done: summary.done,
            percent: summary.percent,
            remaining: summary.remaining,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StudyRowResponse {
    pub date: NaiveDate,
    pub pages: f64,
    pub cumulative: f64,
}

impl From<&ProgressPoint> for StudyRowResponse {
    fn from(point: &ProgressPoint) -> Self {
        Self {
            date: point.date,
            pages: point.pages,
            cumulative: point.cumulative,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChartSeriesResponse {
    pub dates: Vec<NaiveDate>,
    pub daily: Vec<f64>,
    pub cumulative: Vec<f64>,
}

impl From<ChartSeries> for ChartSeriesResponse {
    fn from(series: ChartSeries) -> Self {
        Self {
            dates: series.dates,
            daily: series.daily,
            cumulative: series.cumulative,
        }
    }
}

/// A guestbook entry as displayed. The stored password hash is never exposed.
#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub timestamp: String,
    pub nickname: String,
    pub content: String,
}

impl From<&CommentEntry> for CommentResponse {
    fn from(entry: &CommentEntry) -> Self {
        Self {
            timestamp: entry.timestamp.clone(),
            nickname: entry.display_nickname().to_string(),
            content: entry.content.clone(),
        }
    }
}

/// Everything the dashboard page renders.
#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub display: DisplayResponse,
    pub summary: SummaryResponse,
    /// Newest date first.
    pub study_log: Vec<StudyRowResponse>,
    /// Absent when there is no study data; charts are then skipped.
    pub charts: Option<ChartSeriesResponse>,
    /// Most recent whip first.
    pub guestbook: Vec<CommentResponse>,
    pub notices: Vec<String>,
}

impl DashboardResponse {
    pub fn new(dashboard: &Dashboard, display: &DisplayConfig) -> Self {
        Self {
            display: display.into(),
            summary: dashboard.progress.summary.into(),
            study_log: dashboard.progress.newest_first().map(Into::into).collect(),
            charts: dashboard.progress.chart_series().map(Into::into),
            guestbook: dashboard.guestbook.newest_first().map(Into::into).collect(),
            notices: dashboard.notices.clone(),
        }
    }
}

/// The study log in date order with running totals.
#[derive(Serialize, ToSchema)]
pub struct StudyLogResponse {
    pub summary: SummaryResponse,
    pub entries: Vec<StudyRowResponse>,
    pub notices: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GuestbookResponse {
    /// Most recent whip first.
    pub comments: Vec<CommentResponse>,
    pub notices: Vec<String>,
}

/// A new whip. Missing fields read as empty and fail validation.
#[derive(Deserialize, ToSchema)]
pub struct CommentRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StudyRequest {
    pub date: NaiveDate,
    pub pages: f64,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

pub(crate) fn service_error_response(e: ServiceError) -> (StatusCode, String) {
    let status = match &e {
        ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Coercion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::ReadBeforeWrite { .. } | ServiceError::Write { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        warn!("Rejected submission: {}", e);
    } else {
        error!("Request failed: {}", e);
    }
    (status, e.to_string())
}

fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// GET /api/dashboard - Progress summary, charts, study log and guestbook in one payload.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard loaded", body = DashboardResponse),
        (status = 500, description = "The study log contains an unreadable date")
    )
)]
pub async fn get_dashboard_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let dashboard = state
        .dashboard
        .load()
        .await
        .map_err(service_error_response)?;
    Ok(Json(DashboardResponse::new(
        &dashboard,
        &state.config.display,
    )))
}

/// GET /api/study - The study log in date order with running totals.
#[utoipa::path(
    get,
    path = "/api/study",
    responses(
        (status = 200, description = "Study log loaded", body = StudyLogResponse),
        (status = 500, description = "The study log contains an unreadable date")
    )
)]
pub async fn get_study_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut notices = Vec::new();
    let progress = state
        .dashboard
        .load_progress(&mut notices)
        .await
        .map_err(service_error_response)?;
    Ok(Json(StudyLogResponse {
        summary: progress.summary.into(),
        entries: progress.log.iter().map(Into::into).collect(),
        notices,
    }))
}

/// GET /api/comments - The guestbook, most recent first.
#[utoipa::path(
    get,
    path = "/api/comments",
    responses(
        (status = 200, description = "Guestbook loaded", body = GuestbookResponse)
    )
)]
pub async fn get_comments_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut notices = Vec::new();
    let guestbook = state.dashboard.load_guestbook(&mut notices).await;
    Json(GuestbookResponse {
        comments: guestbook.newest_first().map(Into::into).collect(),
        notices,
    })
}

/// POST /api/comments - Deliver a whip.
///
/// An optional password is stored as an Argon2 hash and is not used for anything else.
#[utoipa::path(
    post,
    path = "/api/comments",
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Whip saved; the reloaded dashboard is returned", body = DashboardResponse),
        (status = 422, description = "Nickname or message is empty"),
        (status = 502, description = "The spreadsheet rejected the write")
    )
)]
pub async fn post_comment_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let password = match req.password.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => Some(hash_password(p)?),
        _ => None,
    };

    let dashboard = state
        .dashboard
        .submit_comment(CommentSubmission {
            nickname: req.nickname,
            content: req.content,
            password,
        })
        .await
        .map_err(service_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(DashboardResponse::new(&dashboard, &state.config.display)),
    ))
}

/// POST /api/admin/study - Record pages read. Requires the admin password.
#[utoipa::path(
    post,
    path = "/api/admin/study",
    request_body = StudyRequest,
    params(
        ("x-admin-password" = String, Header, description = "The shared admin password.")
    ),
    responses(
        (status = 201, description = "Entry saved; the reloaded dashboard is returned", body = DashboardResponse),
        (status = 401, description = "Wrong or missing admin password"),
        (status = 403, description = "No admin password is configured"),
        (status = 422, description = "Page count is negative or not a finite number"),
        (status = 502, description = "The spreadsheet rejected the write")
    )
)]
pub async fn post_study_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StudyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let dashboard = state
        .dashboard
        .record_study(StudySubmission {
            date: req.date,
            pages: req.pages,
        })
        .await
        .map_err(service_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(DashboardResponse::new(&dashboard, &state.config.display)),
    ))
}
