//! Todo CRUD, listing, and search — cache-aside over the repository.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use taskhub_cache::keys;
use taskhub_cache::provider::CacheManager;
use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::CacheProvider;
use taskhub_core::types::pagination::{PageRequest, PageResponse};
use taskhub_database::repositories::TodoRepository;
use taskhub_entity::todo::model::{CreateTodo, Todo, UpdateTodo};
use taskhub_resilience::ResiliencePolicy;

use crate::context::RequestContext;

/// TTL for cached todo reads.
const TODO_CACHE_TTL: Duration = Duration::from_secs(120);

/// Handles todo CRUD, listing, and full-text search for the owning
/// user. Reads are cache-aside; every write invalidates the owner's
/// cached entries.
#[derive(Debug, Clone)]
pub struct TodoService {
    /// Todo repository.
    todo_repo: Arc<TodoRepository>,
    /// Cache manager.
    cache: Arc<CacheManager>,
    /// Gate + deadline composition for every database call.
    policy: Arc<ResiliencePolicy>,
}

impl TodoService {
    /// Creates a new todo service.
    pub fn new(
        todo_repo: Arc<TodoRepository>,
        cache: Arc<CacheManager>,
        policy: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            todo_repo,
            cache,
            policy,
        }
    }

    /// Lists the caller's todos, optionally filtered by completion.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        completed: Option<bool>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Todo>> {
        let cache_key = keys::todo_list(ctx.user_id, completed, page.page);

        if let Some(cached) = self.cache.get_json(&cache_key).await.unwrap_or(None) {
            return Ok(cached);
        }

        let result = self
            .policy
            .write(self.todo_repo.find_by_user(ctx.user_id, completed, page))
            .await?;

        let _ = self
            .cache
            .set_json(&cache_key, &result, TODO_CACHE_TTL)
            .await;

        Ok(result)
    }

    /// Full-text search over the caller's todos.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Todo>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query cannot be empty"));
        }

        self.policy
            .write(self.todo_repo.search(ctx.user_id, query, page))
            .await
    }

    /// Fetches one todo, enforcing ownership.
    pub async fn get(&self, ctx: &RequestContext, todo_id: Uuid) -> AppResult<Todo> {
        let cache_key = keys::todo_by_id(todo_id);

        if let Some(cached) = self
            .cache
            .get_json::<Todo>(&cache_key)
            .await
            .unwrap_or(None)
        {
            return self.check_owner(ctx, cached);
        }

        let todo = self
            .policy
            .read(self.todo_repo.find_by_id(todo_id))
            .await?
            .ok_or_else(|| AppError::not_found("Todo not found"))?;

        let _ = self.cache.set_json(&cache_key, &todo, TODO_CACHE_TTL).await;

        self.check_owner(ctx, todo)
    }

    /// Creates a todo owned by the caller.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        title: String,
        description: Option<String>,
        due_date: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<Todo> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("Title cannot be empty"));
        }

        let todo = self
            .policy
            .write(self.todo_repo.create(&CreateTodo {
                user_id: ctx.user_id,
                title,
                description,
                due_date,
            }))
            .await?;

        self.invalidate_lists(ctx.user_id).await;
        info!(user_id = %ctx.user_id, todo_id = %todo.id, "Todo created");

        Ok(todo)
    }

    /// Applies a partial update to a caller-owned todo.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        todo_id: Uuid,
        changes: UpdateTodo,
    ) -> AppResult<Todo> {
        // Ownership check before the write.
        self.get(ctx, todo_id).await?;

        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("Title cannot be empty"));
            }
        }

        let updated = self
            .policy
            .write(self.todo_repo.update(todo_id, &changes))
            .await?
            .ok_or_else(|| AppError::not_found("Todo not found"))?;

        self.invalidate_todo(ctx.user_id, todo_id).await;

        Ok(updated)
    }

    /// Flips a caller-owned todo's completion state.
    pub async fn toggle(&self, ctx: &RequestContext, todo_id: Uuid) -> AppResult<Todo> {
        self.get(ctx, todo_id).await?;

        let toggled = self
            .policy
            .write(self.todo_repo.toggle_completed(todo_id))
            .await?
            .ok_or_else(|| AppError::not_found("Todo not found"))?;

        self.invalidate_todo(ctx.user_id, todo_id).await;

        Ok(toggled)
    }

    /// Deletes a caller-owned todo.
    pub async fn delete(&self, ctx: &RequestContext, todo_id: Uuid) -> AppResult<()> {
        self.get(ctx, todo_id).await?;

        let deleted = self
            .policy
            .write(self.todo_repo.delete(todo_id))
            .await?;
        if !deleted {
            return Err(AppError::not_found("Todo not found"));
        }

        self.invalidate_todo(ctx.user_id, todo_id).await;
        info!(user_id = %ctx.user_id, todo_id = %todo_id, "Todo deleted");

        Ok(())
    }

    fn check_owner(&self, ctx: &RequestContext, todo: Todo) -> AppResult<Todo> {
        if todo.user_id != ctx.user_id {
            // Hide other users' todos entirely rather than revealing
            // their existence with a 403.
            return Err(AppError::not_found("Todo not found"));
        }
        Ok(todo)
    }

    async fn invalidate_todo(&self, user_id: Uuid, todo_id: Uuid) {
        let _ = self.cache.delete(&keys::todo_by_id(todo_id)).await;
        self.invalidate_lists(user_id).await;
    }

    async fn invalidate_lists(&self, user_id: Uuid) {
        let _ = self
            .cache
            .delete_pattern(&keys::todo_list_pattern(user_id))
            .await;
    }
}
