//! API request handlers: auth, health and the student surface

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::api::auth::JwtConfig;
use crate::api::error::{error_response, ApiError};
use crate::api::server::CurrentStudent;
use crate::ledger::{JobStatus, LaundryJob, LedgerManager, Priority, Student, SubmitRequest};
use crate::security::{Authenticator, Role};

/// Shared application state
pub struct AppState {
    pub authenticator: Authenticator,
    pub ledger: LedgerManager,
    pub jwt_config: JwtConfig,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub user_type: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

/// Register request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub user_type: String,
    pub email: Option<String>,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub id: i64,
}

/// Token verification response
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Submit request body
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub num_clothes: i64,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

/// Submit response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub remaining_quota: i64,
    pub job: LaundryJob,
}

/// Student dashboard response
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub id: i64,
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub quota_limit: i64,
    pub remaining_quota: i64,
    #[serde(flatten)]
    pub stats: crate::ledger::StudentStats,
    pub recent_jobs: Vec<LaundryJob>,
}

/// History query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<String>,
}

/// Paginated history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub jobs: Vec<LaundryJob>,
}

/// GET /health - Service health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.authenticator.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}

/// POST /api/auth/login - Authenticate and get JWT token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    match req.user_type.as_str() {
        "student" => {
            let student = state
                .authenticator
                .authenticate_student(&req.username, &req.password)
                .await
                .map_err(error_response)?;

            let Some(student) = student else {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ApiError::new("Invalid student ID or password")),
                ));
            };

            let token = issue_token(&state.jwt_config, &student.student_id, student.id, Role::Student)?;
            Ok(Json(LoginResponse {
                token,
                user_id: student.id,
                username: student.student_id,
                role: Role::Student,
            }))
        }
        "admin" => {
            let admin = state
                .authenticator
                .authenticate_admin(&req.username, &req.password)
                .await
                .map_err(error_response)?;

            let Some(admin) = admin else {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ApiError::new("Invalid username or password")),
                ));
            };

            let token = issue_token(&state.jwt_config, &admin.username, admin.id, Role::Admin)?;
            Ok(Json(LoginResponse {
                token,
                user_id: admin.id,
                username: admin.username,
                role: Role::Admin,
            }))
        }
        other => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(&format!(
                "Invalid user type '{}'. Must be 'student' or 'admin'",
                other
            ))),
        )),
    }
}

fn issue_token(
    jwt: &JwtConfig,
    sub: &str,
    uid: i64,
    role: Role,
) -> Result<String, (StatusCode, Json<ApiError>)> {
    jwt.create_token(sub, uid, role).map_err(|e| {
        warn!("Failed to create token for {}: {}", sub, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new("Failed to create token")),
        )
    })
}

/// POST /api/auth/register - Create an admin account
///
/// Student accounts are provisioned by staff through the laundry-user
/// CLI, so the open endpoint only registers admins.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, Json<ApiError>)> {
    if req.user_type != "admin" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "Only admin registration is supported; student accounts are created by staff",
            )),
        ));
    }

    let id = state
        .authenticator
        .create_admin(&req.username, req.email.as_deref(), &req.password)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: format!("Admin {} registered successfully", req.username),
            id,
        }),
    ))
}

/// POST /api/auth/logout - Acknowledge a logout
///
/// Tokens are not tracked server side; the client discards its copy
/// and this endpoint just confirms.
pub async fn logout() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Logged out successfully" }))
}

/// GET /api/auth/verify - Check a token and describe its principal
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, (StatusCode, Json<ApiError>)> {
    match state.jwt_config.validate_token(&query.token) {
        Ok(claims) => Ok(Json(VerifyResponse {
            valid: true,
            user_id: claims.uid,
            username: claims.sub,
            role: claims.role,
        })),
        Err(_) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Invalid or expired token")),
        )),
    }
}

/// Load the calling student's account, rejecting deactivated ones
///
/// Tokens outlive account changes, so the active flag is re-checked on
/// every student request.
async fn load_active_student(
    state: &AppState,
    uid: i64,
) -> Result<Student, (StatusCode, Json<ApiError>)> {
    let student = state
        .ledger
        .get_student(uid)
        .await
        .map_err(error_response)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Student account not found")),
        ))?;

    if !student.is_active {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiError::new("Account is inactive")),
        ));
    }

    Ok(student)
}

/// GET /api/student/dashboard - Quota and request overview
pub async fn student_dashboard(
    State(state): State<Arc<AppState>>,
    CurrentStudent(claims): CurrentStudent,
) -> Result<Json<DashboardResponse>, (StatusCode, Json<ApiError>)> {
    let student = load_active_student(&state, claims.uid).await?;
    let stats = state
        .ledger
        .student_stats(student.id)
        .await
        .map_err(error_response)?;
    let recent_jobs = state
        .ledger
        .recent_jobs(student.id, 5)
        .await
        .map_err(error_response)?;

    Ok(Json(DashboardResponse {
        id: student.id,
        student_id: student.student_id,
        name: student.name,
        email: student.email,
        quota_limit: student.quota_limit,
        remaining_quota: student.remaining_quota,
        stats,
        recent_jobs,
    }))
}

/// POST /api/student/submit - Submit a laundry request
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    CurrentStudent(claims): CurrentStudent,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ApiError>)> {
    let priority = match &body.priority {
        Some(raw) => Priority::from_str(raw).ok_or((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "Invalid priority. Must be one of: low, normal, high, urgent",
            )),
        ))?,
        None => Priority::default(),
    };

    let request = SubmitRequest {
        num_clothes: body.num_clothes,
        priority,
        notes: body.notes,
    };

    let (job, remaining_quota) = state
        .ledger
        .submit_request(claims.uid, &request)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: format!(
                "Request submitted successfully. {} clothes remaining in quota",
                remaining_quota
            ),
            remaining_quota,
            job,
        }),
    ))
}

/// GET /api/student/history - Paginated request history
pub async fn student_history(
    State(state): State<Arc<AppState>>,
    CurrentStudent(claims): CurrentStudent,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ApiError>)> {
    let student = load_active_student(&state, claims.uid).await?;
    let (page, page_size) = validate_pagination(query.page, query.page_size)?;
    let status = parse_status_filter(query.status.as_deref())?;

    let (total, jobs) = state
        .ledger
        .student_history(student.id, status, page, page_size)
        .await
        .map_err(error_response)?;

    Ok(Json(HistoryResponse {
        total,
        page,
        page_size,
        jobs,
    }))
}

/// GET /api/student/jobs/:id - A single request, if it belongs to the caller
pub async fn student_job(
    State(state): State<Arc<AppState>>,
    CurrentStudent(claims): CurrentStudent,
    Path(job_id): Path<i64>,
) -> Result<Json<LaundryJob>, (StatusCode, Json<ApiError>)> {
    let student = load_active_student(&state, claims.uid).await?;

    let job = state
        .ledger
        .get_student_job(student.id, job_id)
        .await
        .map_err(error_response)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Laundry request not found")),
        ))?;

    Ok(Json(job))
}

pub(crate) fn validate_pagination(
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<(i64, i64), (StatusCode, Json<ApiError>)> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(20);

    if page < 1 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("page must be at least 1")),
        ));
    }
    if !(1..=100).contains(&page_size) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("page_size must be between 1 and 100")),
        ));
    }

    Ok((page, page_size))
}

pub(crate) fn parse_status_filter(
    raw: Option<&str>,
) -> Result<Option<JobStatus>, (StatusCode, Json<ApiError>)> {
    match raw {
        None => Ok(None),
        Some(raw) => JobStatus::from_str(raw).map(Some).ok_or((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "Invalid status. Must be one of: submitted, processing, completed, cancelled",
            )),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pagination_defaults() {
        let (page, page_size) = validate_pagination(None, None).unwrap();
        assert_eq!(page, 1);
        assert_eq!(page_size, 20);
    }

    #[test]
    fn test_validate_pagination_bounds() {
        assert!(validate_pagination(Some(0), None).is_err());
        assert!(validate_pagination(Some(-1), None).is_err());
        assert!(validate_pagination(None, Some(0)).is_err());
        assert!(validate_pagination(None, Some(101)).is_err());
        assert!(validate_pagination(Some(3), Some(100)).is_ok());
    }

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("processing")).unwrap(),
            Some(JobStatus::Processing)
        );
        assert!(parse_status_filter(Some("folded")).is_err());
    }
}
