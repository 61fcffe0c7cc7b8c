//! Todo handlers — CRUD, toggle, and search.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;
use validator::Validate;

use taskhub_core::error::AppError;
use taskhub_core::types::pagination::PageResponse;
use taskhub_entity::todo::model::{Todo, UpdateTodo};

use crate::dto::request::{CreateTodoRequest, SearchParams, TodoListParams, UpdateTodoRequest};
use crate::dto::response::{ApiResponse, MessageResponse};
use crate::extractors::{AuthUser, PaginationParams};
use crate::state::AppState;

/// GET /api/todos
pub async fn list_todos(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<TodoListParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Todo>>>, AppError> {
    let page = pagination.into_page_request();
    let todos = state
        .todo_service
        .list(&auth.ctx, filter.completed, &page)
        .await?;

    Ok(Json(ApiResponse::ok(todos)))
}

/// GET /api/todos/search?q=
pub async fn search_todos(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SearchParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Todo>>>, AppError> {
    let page = pagination.into_page_request();
    let todos = state
        .todo_service
        .search(&auth.ctx, &params.q, &page)
        .await?;

    Ok(Json(ApiResponse::ok(todos)))
}

/// GET /api/todos/{id}
pub async fn get_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Todo>>, AppError> {
    let todo = state.todo_service.get(&auth.ctx, id).await?;
    Ok(Json(ApiResponse::ok(todo)))
}

/// POST /api/todos
pub async fn create_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateTodoRequest>,
) -> Result<Json<ApiResponse<Todo>>, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let todo = state
        .todo_service
        .create(&auth.ctx, req.title, req.description, req.due_date)
        .await?;

    Ok(Json(ApiResponse::ok(todo)))
}

/// PUT /api/todos/{id}
pub async fn update_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<Json<ApiResponse<Todo>>, AppError> {
    let changes = UpdateTodo {
        title: req.title,
        description: req.description,
        completed: req.completed,
        due_date: req.due_date,
    };

    let todo = state.todo_service.update(&auth.ctx, id, changes).await?;
    Ok(Json(ApiResponse::ok(todo)))
}

/// POST /api/todos/{id}/toggle
pub async fn toggle_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Todo>>, AppError> {
    let todo = state.todo_service.toggle(&auth.ctx, id).await?;
    Ok(Json(ApiResponse::ok(todo)))
}

/// DELETE /api/todos/{id}
pub async fn delete_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.todo_service.delete(&auth.ctx, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("Todo deleted"))))
}
