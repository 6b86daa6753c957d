use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use shared::{ApiError, ErrorKind, User};
use uuid::Uuid;

use crate::middleware::auth::extract_user_id;
use crate::models::AppState;
use crate::services::auth as auth_service;

pub mod auth;
pub mod users;
pub mod tasks;
pub mod rewards;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::configure)
            .configure(users::configure)
            .configure(tasks::configure)
            .configure(rewards::configure)
    );
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidOperation => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(kind: ErrorKind, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status_for(kind)).json(ApiError::new(kind, message))
}

/// Turn a failed service call into a response. Internal failures are logged
/// and reported without their details.
pub fn service_error(action: &str, kind: ErrorKind, err: &dyn std::fmt::Display) -> HttpResponse {
    if kind == ErrorKind::Internal {
        log::error!("Failed to {}: {}", action, err);
        return error_response(kind, format!("Failed to {}", action));
    }

    error_response(kind, err.to_string())
}

/// Resolve the bearer token to a live user
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<User, HttpResponse> {
    let user_id = extract_user_id(req, &state.config.jwt_secret)
        .map_err(|e| error_response(ErrorKind::Unauthorized, e.to_string()))?;

    match auth_service::get_user_by_id(&state.db, &user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error_response(ErrorKind::Unauthorized, "User no longer exists")),
        Err(e) => Err(service_error("authenticate", e.kind(), &e)),
    }
}

pub async fn require_admin(req: &HttpRequest, state: &AppState) -> Result<User, HttpResponse> {
    let user = authenticate(req, state).await?;

    if !user.admin {
        return Err(error_response(ErrorKind::Forbidden, "Administrator access required"));
    }

    Ok(user)
}

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| error_response(ErrorKind::InvalidInput, format!("Invalid {} ID format", what)))
}
