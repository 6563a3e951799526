//! Admin API handlers
//!
//! Everything here sits behind the auth middleware plus the admin role
//! gate. Status transitions still pass the caller's role down into the
//! ledger, which performs its own capability check before touching the
//! books.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{error_response, ApiError};
use crate::api::handlers::{parse_status_filter, validate_pagination, AppState};
use crate::api::server::CurrentAdmin;
use crate::ledger::{JobStats, JobStatus, JobWithStudent, LaundryJob};

/// Status update request body
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub request_id: i64,
    pub status: String,
}

/// Status update response
#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub message: String,
    pub job: LaundryJob,
}

/// Admin dashboard response
#[derive(Debug, Serialize)]
pub struct AdminDashboardResponse {
    /// The submission queue, oldest first
    pub pending_jobs: Vec<JobWithStudent>,
    pub processing_jobs: Vec<JobWithStudent>,
    pub total_pending: i64,
    pub total_processing: i64,
    pub completed_today: i64,
}

/// Job list query parameters
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub student_id: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Paginated job list response
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub jobs: Vec<JobWithStudent>,
}

/// Analytics query parameters
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

/// Analytics response
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub period_days: i64,
    #[serde(flatten)]
    pub stats: JobStats,
}

/// PATCH /api/admin/update-status - Move a request through its lifecycle
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(claims): CurrentAdmin,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, (StatusCode, Json<ApiError>)> {
    let new_status = JobStatus::from_str(&req.status).ok_or((
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(
            "Invalid status. Must be one of: submitted, processing, completed, cancelled",
        )),
    ))?;

    let job = state
        .ledger
        .update_status(req.request_id, new_status, claims.role)
        .await
        .map_err(error_response)?;

    Ok(Json(UpdateStatusResponse {
        message: format!("Job {} status updated to '{}'", job.id, job.status),
        job,
    }))
}

/// GET /api/admin/dashboard - The laundry room work queues
pub async fn admin_dashboard(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_claims): CurrentAdmin,
) -> Result<Json<AdminDashboardResponse>, (StatusCode, Json<ApiError>)> {
    let pending_jobs = state
        .ledger
        .board_jobs(JobStatus::Submitted)
        .await
        .map_err(error_response)?;
    let processing_jobs = state
        .ledger
        .board_jobs(JobStatus::Processing)
        .await
        .map_err(error_response)?;
    let completed_today = state
        .ledger
        .completed_today()
        .await
        .map_err(error_response)?;

    Ok(Json(AdminDashboardResponse {
        total_pending: pending_jobs.len() as i64,
        total_processing: processing_jobs.len() as i64,
        pending_jobs,
        processing_jobs,
        completed_today,
    }))
}

/// GET /api/admin/jobs - All requests, filterable and paginated
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_claims): CurrentAdmin,
    Query(query): Query<JobListQuery>,
) -> Result<Json<JobListResponse>, (StatusCode, Json<ApiError>)> {
    let (page, page_size) = validate_pagination(query.page, query.page_size)?;
    let status = parse_status_filter(query.status.as_deref())?;

    let (total, jobs) = state
        .ledger
        .list_jobs(status, query.student_id.as_deref(), page, page_size)
        .await
        .map_err(error_response)?;

    Ok(Json(JobListResponse {
        total,
        page,
        page_size,
        jobs,
    }))
}

/// GET /api/admin/analytics - Request statistics over a recent window
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    CurrentAdmin(_claims): CurrentAdmin,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, (StatusCode, Json<ApiError>)> {
    let days = query.days.unwrap_or(7);
    if !(1..=365).contains(&days) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("days must be between 1 and 365")),
        ));
    }

    let stats = state.ledger.analytics(days).await.map_err(error_response)?;

    Ok(Json(AnalyticsResponse {
        period_days: days,
        stats,
    }))
}
