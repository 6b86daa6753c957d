use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use shared::{ApiSuccess, CreateRewardRequest, ErrorKind, RewardStatusFilter, UpdateRewardRequest};

use super::{authenticate, error_response, parse_id, require_admin, service_error};
use crate::models::AppState;
use crate::services::rewards as reward_service;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/rewards")
            .route("", web::get().to(list_rewards))
            .route("", web::post().to(create_reward))
            .route("/{reward_id}", web::get().to(get_reward))
            .route("/{reward_id}", web::put().to(update_reward))
            .route("/{reward_id}", web::delete().to(delete_reward))
            .route("/{reward_id}/redeem", web::put().to(redeem_reward))
    );
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

async fn list_rewards(state: web::Data<AppState>, req: HttpRequest, query: web::Query<ListQuery>) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };

    let filter = match query.status.as_deref().map(str::parse::<RewardStatusFilter>) {
        None => RewardStatusFilter::All,
        Some(Ok(filter)) => filter,
        Some(Err(())) => {
            return Ok(error_response(ErrorKind::InvalidInput, "Unknown status, expected all, available or redeemed"));
        }
    };

    let scope = if user.admin { None } else { Some(&user.id) };

    match reward_service::list_rewards(&state.db, scope, filter).await {
        Ok(rewards) => Ok(HttpResponse::Ok().json(ApiSuccess::new(rewards))),
        Err(e) => Ok(service_error("list rewards", e.kind(), &e)),
    }
}

async fn create_reward(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateRewardRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }

    match reward_service::create_reward(&state.db, &body.into_inner()).await {
        Ok(reward) => Ok(HttpResponse::Created().json(ApiSuccess::new(reward))),
        Err(e) => Ok(service_error("create reward", e.kind(), &e)),
    }
}

async fn get_reward(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let reward_id = match parse_id(&path.into_inner(), "reward") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match reward_service::get_reward(&state.db, &reward_id).await {
        Ok(Some(reward)) if user.admin || reward.assigned_user_id == Some(user.id) => {
            Ok(HttpResponse::Ok().json(ApiSuccess::new(reward)))
        }
        Ok(Some(_)) => Ok(error_response(ErrorKind::Forbidden, "This reward is not yours")),
        Ok(None) => Ok(error_response(ErrorKind::NotFound, "Reward not found")),
        Err(e) => Ok(service_error("fetch reward", e.kind(), &e)),
    }
}

async fn update_reward(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateRewardRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let reward_id = match parse_id(&path.into_inner(), "reward") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match reward_service::update_reward(&state.db, &reward_id, &body.into_inner()).await {
        Ok(reward) => Ok(HttpResponse::Ok().json(ApiSuccess::new(reward))),
        Err(e) => Ok(service_error("update reward", e.kind(), &e)),
    }
}

async fn delete_reward(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let reward_id = match parse_id(&path.into_inner(), "reward") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match reward_service::delete_reward(&state.db, &reward_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(service_error("delete reward", e.kind(), &e)),
    }
}

async fn redeem_reward(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let reward_id = match parse_id(&path.into_inner(), "reward") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    if !user.admin {
        match reward_service::get_reward(&state.db, &reward_id).await {
            Ok(Some(reward)) if reward.assigned_user_id != Some(user.id) => {
                return Ok(error_response(ErrorKind::Forbidden, "This reward is not yours"));
            }
            Ok(_) => {}
            Err(e) => return Ok(service_error("redeem reward", e.kind(), &e)),
        }
    }

    match reward_service::redeem_reward(&state.db, &reward_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiSuccess::new(response))),
        Err(e) => Ok(service_error("redeem reward", e.kind(), &e)),
    }
}
