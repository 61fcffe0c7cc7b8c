//! Todo repository implementation, including full-text search.

use sqlx::PgPool;
use uuid::Uuid;

use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_core::types::pagination::{PageRequest, PageResponse};
use taskhub_entity::todo::model::{CreateTodo, Todo, UpdateTodo};

/// Repository for todo CRUD, listing, and full-text search.
#[derive(Debug, Clone)]
pub struct TodoRepository {
    pool: PgPool,
}

impl TodoRepository {
    /// Create a new todo repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a todo by primary key.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Todo>> {
        sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find todo", e))
    }

    /// List one user's todos, optionally filtered by completion state.
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
        completed: Option<bool>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Todo>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM todos WHERE user_id = $1 AND ($2::boolean IS NULL OR completed = $2)",
        )
        .bind(user_id)
        .bind(completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count todos", e))?;

        let todos = sqlx::query_as::<_, Todo>(
            "SELECT * FROM todos \
             WHERE user_id = $1 AND ($2::boolean IS NULL OR completed = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(completed)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list todos", e))?;

        Ok(PageResponse::new(
            todos,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Full-text search over one user's todos.
    ///
    /// Uses the generated `search_vector` column (title weighted above
    /// description) with `websearch_to_tsquery`, ranked by relevance.
    pub async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Todo>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM todos \
             WHERE user_id = $1 AND search_vector @@ websearch_to_tsquery('english', $2)",
        )
        .bind(user_id)
        .bind(query)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count search results", e)
        })?;

        let todos = sqlx::query_as::<_, Todo>(
            "SELECT id, user_id, title, description, completed, due_date, created_at, updated_at \
             FROM todos \
             WHERE user_id = $1 AND search_vector @@ websearch_to_tsquery('english', $2) \
             ORDER BY ts_rank(search_vector, websearch_to_tsquery('english', $2)) DESC, created_at DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(query)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search todos", e))?;

        Ok(PageResponse::new(
            todos,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Create a new todo.
    pub async fn create(&self, data: &CreateTodo) -> AppResult<Todo> {
        sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (user_id, title, description, due_date) \
             VALUES ($1, $2, $3, $4) RETURNING id, user_id, title, description, completed, due_date, created_at, updated_at",
        )
        .bind(data.user_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create todo", e))
    }

    /// Apply a partial update. `None` fields are left unchanged.
    pub async fn update(&self, id: Uuid, data: &UpdateTodo) -> AppResult<Option<Todo>> {
        sqlx::query_as::<_, Todo>(
            "UPDATE todos SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             completed = COALESCE($4, completed), \
             due_date = COALESCE($5, due_date), \
             updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, user_id, title, description, completed, due_date, created_at, updated_at",
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.completed)
        .bind(data.due_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update todo", e))
    }

    /// Flip a todo's completion state.
    pub async fn toggle_completed(&self, id: Uuid) -> AppResult<Option<Todo>> {
        sqlx::query_as::<_, Todo>(
            "UPDATE todos SET completed = NOT completed, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, user_id, title, description, completed, due_date, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to toggle todo", e))
    }

    /// Delete a todo. Returns `true` if a row was deleted.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete todo", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every todo owned by a user. Returns the number removed.
    ///
    /// Idempotent: zero remaining rows is a success, not an error, so
    /// the cascade-delete consumer can be redelivered safely.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM todos WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge user todos", e)
            })?;
        Ok(result.rows_affected())
    }
}
