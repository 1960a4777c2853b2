use axum::extract::{Json, Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::Attachment;
use crate::repo::{self, TodoChanges, TodoWithAttachments};
use crate::state::AppState;

const MIN_TITLE_LEN: usize = 2;
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PER_PAGE: i64 = 10;

/// A todo as the API exposes it. The owner id stays server-side.
#[derive(Serialize)]
pub struct TodoResponse {
    pub id: i64,
    pub title: String,
    pub status: bool,
    pub attachments: Vec<Attachment>,
}

impl From<TodoWithAttachments> for TodoResponse {
    fn from((todo, attachments): TodoWithAttachments) -> Self {
        Self {
            id: todo.id,
            title: todo.title,
            status: todo.status,
            attachments,
        }
    }
}

#[derive(Serialize)]
pub struct TodoListResponse {
    pub user_id: i64,
    pub count: usize,
    pub todos: Vec<TodoResponse>,
}

#[derive(Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub status: bool,
}

#[derive(Serialize)]
pub struct DeleteTodoResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub data: Vec<TodoResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

pub async fn list_todos(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<TodoListResponse>> {
    let mut conn = state.db()?;
    let owned = repo::list_by_owner(&mut conn, user.user_id)?;

    Ok(Json(TodoListResponse {
        user_id: user.user_id,
        count: owned.len(),
        todos: owned.into_iter().map(TodoResponse::from).collect(),
    }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTodoRequest>,
) -> AppResult<Json<TodoResponse>> {
    let title = payload.title.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        return Err(AppError::bad_request(format!(
            "title must be at least {MIN_TITLE_LEN} characters"
        )));
    }

    let mut conn = state.db()?;
    let todo = repo::create(&mut conn, title, user.user_id)?;
    info!(todo_id = todo.id, user_id = user.user_id, "todo created");

    Ok(Json(TodoResponse::from((todo, Vec::new()))))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    user: AuthenticatedUser,
) -> AppResult<Json<TodoResponse>> {
    let mut conn = state.db()?;
    let found = repo::get_by_id(&mut conn, todo_id, user.user_id)?.ok_or_else(AppError::not_found)?;

    Ok(Json(TodoResponse::from(found)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateTodoRequest>,
) -> AppResult<Json<TodoResponse>> {
    let mut conn = state.db()?;

    let changes = TodoChanges {
        title: payload.title,
        status: payload.status,
    };
    let updated =
        repo::update(&mut conn, todo_id, user.user_id, changes)?.ok_or_else(AppError::not_found)?;

    info!(todo_id = updated.id, user_id = user.user_id, "todo updated");

    let found = repo::get_by_id(&mut conn, todo_id, user.user_id)?.ok_or_else(AppError::not_found)?;
    Ok(Json(TodoResponse::from(found)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    user: AuthenticatedUser,
) -> AppResult<Json<DeleteTodoResponse>> {
    let mut conn = state.db()?;

    let removed = repo::delete(&mut conn, todo_id, user.user_id)?;
    if removed == 0 {
        return Err(AppError::not_found());
    }

    info!(todo_id, user_id = user.user_id, "todo deleted");
    Ok(Json(DeleteTodoResponse {
        message: "todo deleted".to_string(),
    }))
}

pub async fn search_todos(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<SearchResponse>> {
    let page = params.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
    let per_page = params
        .per_page
        .filter(|p| *p >= 1)
        .unwrap_or(DEFAULT_PER_PAGE);

    let mut conn = state.db()?;
    let (matched, total) =
        repo::search_by_owner(&mut conn, user.user_id, &params.search, page, per_page)?;

    Ok(Json(SearchResponse {
        data: matched.into_iter().map(TodoResponse::from).collect(),
        total,
        page,
        per_page,
    }))
}
