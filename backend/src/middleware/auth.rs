use actix_web::HttpRequest;
use thiserror::Error;
use uuid::Uuid;

use crate::services::auth as auth_service;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthMiddlewareError {
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid authorization token")]
    InvalidToken,
}

/// Extract the user id from an `Authorization: Bearer <jwt>` header
pub fn extract_user_id(req: &HttpRequest, jwt_secret: &str) -> Result<Uuid, AuthMiddlewareError> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthMiddlewareError::InvalidToken)?;

    auth_service::verify_jwt(token, jwt_secret).map_err(|_| AuthMiddlewareError::InvalidToken)
}
