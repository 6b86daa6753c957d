use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use shared::{
    ApiSuccess, CreateTaskRequest, DailyCheckResponse, ErrorKind, ResetDailyResponse, Task, TaskStatusFilter,
    UpdateTaskRequest, User,
};
use uuid::Uuid;

use super::{authenticate, error_response, parse_id, require_admin, service_error};
use crate::models::AppState;
use crate::services::daily_reset::{self, ClientDate};
use crate::services::tasks as task_service;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .route("", web::get().to(list_tasks))
            .route("", web::post().to(create_task))
            // Static routes must come before dynamic /{task_id} routes
            .route("/reset-daily", web::post().to(reset_daily))
            .route("/check-daily", web::get().to(check_daily))
            .route("/{task_id}", web::get().to(get_task))
            .route("/{task_id}", web::put().to(update_task))
            .route("/{task_id}", web::delete().to(delete_task))
            .route("/{task_id}/complete", web::put().to(complete_task))
    );
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckDailyQuery {
    current_date: Option<String>,
    /// Admins may reconcile on behalf of another user
    user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CompleteQuery {
    client_date: Option<String>,
}

/// Standard users act on their own tasks and on unassigned ones
fn can_act_on(user: &User, task: &Task) -> bool {
    user.admin || task.assigned_user_id.map_or(true, |id| id == user.id)
}

async fn list_tasks(state: web::Data<AppState>, req: HttpRequest, query: web::Query<ListQuery>) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };

    let filter = match query.status.as_deref() {
        None => TaskStatusFilter::All,
        Some(raw) => match raw.parse::<TaskStatusFilter>() {
            Ok(filter) => filter,
            Err(()) => {
                return Ok(error_response(
                    ErrorKind::InvalidInput,
                    format!("Unknown status '{}', expected all, incomplete or completed", raw),
                ))
            }
        },
    };

    let scope = if user.admin { None } else { Some(&user.id) };

    match task_service::list_tasks(&state.db, scope, filter).await {
        Ok(tasks) => Ok(HttpResponse::Ok().json(ApiSuccess::new(tasks))),
        Err(e) => Ok(service_error("list tasks", e.kind(), &e)),
    }
}

async fn create_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }

    match task_service::create_task(&state.db, &body.into_inner()).await {
        Ok(task) => Ok(HttpResponse::Created().json(ApiSuccess::new(task))),
        Err(e) => Ok(service_error("create task", e.kind(), &e)),
    }
}

async fn reset_daily(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }

    match daily_reset::reset_all_daily(&state.db).await {
        Ok(tasks_reset) => {
            log::info!("Manual daily reset: {} tasks marked incomplete", tasks_reset);
            Ok(HttpResponse::Ok().json(ApiSuccess::new(ResetDailyResponse { tasks_reset })))
        }
        Err(e) => Ok(service_error("reset daily tasks", e.kind(), &e)),
    }
}

async fn check_daily(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<CheckDailyQuery>,
) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };

    let Some(raw_date) = query.current_date.as_deref() else {
        return Ok(error_response(ErrorKind::InvalidInput, "current_date is required"));
    };
    let client_date = match ClientDate::parse(raw_date) {
        Ok(date) => date,
        Err(e) => return Ok(service_error("check daily tasks", e.kind(), &e)),
    };

    let target = match query.user_id {
        Some(other) if other != user.id && !user.admin => {
            return Ok(error_response(ErrorKind::Forbidden, "You can only check your own tasks"));
        }
        Some(other) => other,
        None => user.id,
    };

    match daily_reset::reconcile_for_user(&state.db, &target, client_date).await {
        Ok(tasks_reset) => Ok(HttpResponse::Ok().json(ApiSuccess::new(DailyCheckResponse {
            server_date: daily_reset::server_today(state.config.timezone),
            client_date: client_date.date(),
            tasks_reset,
        }))),
        Err(e) => Ok(service_error("check daily tasks", e.kind(), &e)),
    }
}

async fn get_task(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match task_service::get_task(&state.db, &task_id).await {
        Ok(Some(task)) if can_act_on(&user, &task) => Ok(HttpResponse::Ok().json(ApiSuccess::new(task))),
        Ok(Some(_)) => Ok(error_response(ErrorKind::Forbidden, "This task is assigned to someone else")),
        Ok(None) => Ok(error_response(ErrorKind::NotFound, "Task not found")),
        Err(e) => Ok(service_error("fetch task", e.kind(), &e)),
    }
}

async fn update_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match task_service::update_task(&state.db, &task_id, &body.into_inner()).await {
        Ok(task) => Ok(HttpResponse::Ok().json(ApiSuccess::new(task))),
        Err(e) => Ok(service_error("update task", e.kind(), &e)),
    }
}

async fn delete_task(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse> {
    if let Err(resp) = require_admin(&req, &state).await {
        return Ok(resp);
    }
    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match task_service::delete_task(&state.db, &task_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(service_error("delete task", e.kind(), &e)),
    }
}

async fn complete_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<CompleteQuery>,
) -> Result<HttpResponse> {
    let user = match authenticate(&req, &state).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let task_id = match parse_id(&path.into_inner(), "task") {
        Ok(id) => id,
        Err(resp) => return Ok(resp),
    };

    match task_service::get_task(&state.db, &task_id).await {
        Ok(Some(task)) if !can_act_on(&user, &task) => {
            return Ok(error_response(ErrorKind::Forbidden, "This task is assigned to someone else"));
        }
        Ok(_) => {}
        Err(e) => return Ok(service_error("complete task", e.kind(), &e)),
    }

    let today = daily_reset::server_today(state.config.timezone);

    match task_service::complete_task(&state.db, &task_id, query.client_date.as_deref(), today).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiSuccess::new(response))),
        Err(e) => Ok(service_error("complete task", e.kind(), &e)),
    }
}
