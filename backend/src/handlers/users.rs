use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiSuccess, ErrorKind, PointsRequest, UpdateUserRequest};

use super::{authenticate, error_response, parse_id, require_admin, service_error};
use crate::models::AppState;
use crate::services::{points as points_service, users as user_service};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/{user_id}", web::get().to(get_user))
            .route("/{user_id}", web::put().to(update_user))
            .route("/{user_id}", web::delete().to(delete_user))
            .route("/{user_id}/add-points", web::post().to(add_points))
            .route("/{user_id}/subtract-points", web::post().to(subtract_points))
    );
}

async fn list_users(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    if let Err(resp) = authenticate(&req, &state).await {
        return Ok(resp);
    }

    match user_service::list_users(&state.db).await {
        Ok(users) => Ok(HttpResponse::Ok().json(ApiSuccess::new(users))),
        Err(e) => Ok(service_error("list users", e.kind(), &e)),
    }
}

async fn get_user(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    if let Err(resp) = authenticate(&req, &state).await {
        return Ok(resp);
    }
    let user_id = match parse_id(&path.into_inner(), "user") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match user_service::get_user(&state.db, &user_id).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Ok(None) => Ok(error_response(ErrorKind::NotFound, "User not found")),
        Err(e) => Ok(service_error("fetch user", e.kind(), &e)),
    }
}

/// Users may rename themselves; role and password changes are admin only
async fn update_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let current = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let user_id = match parse_id(&path.into_inner(), "user") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };
    let request = body.into_inner();

    if !current.admin {
        if current.id != user_id {
            return Ok(error_response(ErrorKind::Forbidden, "You can only edit your own account"));
        }
        if request.admin.is_some() || request.password.is_some() {
            return Ok(error_response(ErrorKind::Forbidden, "Only the administrator can change roles or passwords"));
        }
    }

    match user_service::update_user(&state.db, &user_id, &request).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Err(e) => Ok(service_error("update user", e.kind(), &e)),
    }
}

async fn delete_user(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let user_id = match parse_id(&path.into_inner(), "user") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    if admin.id == user_id {
        return Ok(error_response(ErrorKind::InvalidOperation, "The administrator cannot delete their own account"));
    }

    match user_service::delete_user(&state.db, &user_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(service_error("delete user", e.kind(), &e)),
    }
}

async fn add_points(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<PointsRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let user_id = match parse_id(&path.into_inner(), "user") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match points_service::add_points(&state.db, &user_id, body.points).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Err(e) => Ok(service_error("add points", e.kind(), &e)),
    }
}

async fn subtract_points(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<PointsRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let user_id = match parse_id(&path.into_inner(), "user") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match points_service::subtract_points(&state.db, &user_id, body.points).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Err(e) => Ok(service_error("subtract points", e.kind(), &e)),
    }
}
