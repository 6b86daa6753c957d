use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, AuthResponse, CreateUserRequest, LoginRequest, User};

use super::{authenticate, service_error};
use crate::models::AppState;
use crate::services::auth::{self as auth_service, AuthError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(get_current_user))
    );
}

fn token_response(state: &AppState, user: User, created: bool) -> HttpResponse {
    match auth_service::create_jwt(&user.id, &state.config.jwt_secret, state.config.jwt_expiration_hours) {
        Ok(token) => {
            let body = ApiSuccess::new(AuthResponse { token, user });
            if created {
                HttpResponse::Created().json(body)
            } else {
                HttpResponse::Ok().json(body)
            }
        }
        Err(e) => service_error("create token", shared::ErrorKind::Internal, &e),
    }
}

async fn register(state: web::Data<AppState>, body: web::Json<CreateUserRequest>) -> Result<HttpResponse> {
    match auth_service::register_user(&state.db, &body.into_inner()).await {
        Ok(user) => Ok(token_response(&state, user, true)),
        Err(e) => Ok(service_error("register user", e.kind(), &e)),
    }
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse> {
    let request = body.into_inner();

    if !state.login_throttle.check(&request.username) {
        return Ok(HttpResponse::TooManyRequests().json(ApiError {
            error: "too_many_requests".to_string(),
            message: "Too many failed login attempts, try again later".to_string(),
        }));
    }

    match auth_service::login_user(&state.db, &request).await {
        Ok(user) => {
            state.login_throttle.clear(&request.username);
            Ok(token_response(&state, user, false))
        }
        Err(AuthError::InvalidCredentials) => {
            state.login_throttle.record_failure(&request.username);
            log::info!("Failed login for '{}'", request.username);
            Ok(service_error("log in", AuthError::InvalidCredentials.kind(), &"Invalid username or password"))
        }
        Err(e) => Ok(service_error("log in", e.kind(), &e)),
    }
}

async fn get_current_user(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    match authenticate(&req, &state).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Err(resp) => Ok(resp),
    }
}
