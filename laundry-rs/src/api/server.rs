//! API Server - HTTP server for REST API

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::admin;
use crate::api::auth::{Claims, JwtConfig};
use crate::api::error::ApiError;
use crate::api::handlers::{self, AppState};
use crate::ledger::LedgerManager;
use crate::security::{Authenticator, Role};

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        ledger: LedgerManager,
        authenticator: Authenticator,
        jwt_config: JwtConfig,
        addr: String,
    ) -> Self {
        let state = Arc::new(AppState {
            authenticator,
            ledger,
            jwt_config,
        });

        Self { state, addr }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        // CORS configuration
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        // Public routes (no auth required)
        let auth_routes = Router::new()
            .route("/login", post(handlers::login))
            .route("/register", post(handlers::register))
            .route("/logout", post(handlers::logout))
            .route("/verify", get(handlers::verify_token));

        // Student routes (auth required + student role check)
        let student_routes = Router::new()
            .route("/dashboard", get(handlers::student_dashboard))
            .route("/submit", post(handlers::submit_request))
            .route("/history", get(handlers::student_history))
            .route("/jobs/:id", get(handlers::student_job))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ));

        // Admin routes (auth required + admin role check)
        let admin_routes = Router::new()
            .route("/update-status", patch(admin::update_status))
            .route("/dashboard", get(admin::admin_dashboard))
            .route("/jobs", get(admin::list_jobs))
            .route("/analytics", get(admin::analytics))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ));

        // Combine all routes
        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api/auth", auth_routes)
            .nest("/api/student", student_routes)
            .nest("/api/admin", admin_routes)
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Authentication middleware - validates JWT token
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => {
            warn!("Missing or invalid Authorization header");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("Missing or invalid Authorization header")),
            )
                .into_response();
        }
    };

    // Validate token
    match state.jwt_config.validate_token(token) {
        Ok(claims) => {
            // Store claims in request extensions for handlers
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!("Invalid JWT token: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("Invalid or expired token")),
            )
                .into_response()
        }
    }
}

/// Extract Claims from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Claims>().cloned().ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Not authenticated")),
        ))
    }
}

/// Claims of a caller verified to be a student
pub struct CurrentStudent(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentStudent
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;

        if claims.role != Role::Student {
            warn!("Principal {} is not a student", claims.sub);
            return Err((
                StatusCode::FORBIDDEN,
                Json(ApiError::new("Student access required")),
            ));
        }

        Ok(CurrentStudent(claims))
    }
}

/// Claims of a caller verified to be an admin
pub struct CurrentAdmin(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;

        if claims.role != Role::Admin {
            warn!("Principal {} is not an admin", claims.sub);
            return Err((
                StatusCode::FORBIDDEN,
                Json(ApiError::new("Admin access required")),
            ));
        }

        Ok(CurrentAdmin(claims))
    }
}
