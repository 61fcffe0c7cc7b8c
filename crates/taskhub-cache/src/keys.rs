//! Cache key builders for all TaskHub cache entries.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the application uses.

use uuid::Uuid;

/// Prefix applied to all TaskHub cache keys.
const PREFIX: &str = "taskhub";

// ── User keys ──────────────────────────────────────────────

/// Cache key for a user entity by ID.
pub fn user_by_id(user_id: Uuid) -> String {
    format!("{PREFIX}:user:{user_id}")
}

/// Pattern to invalidate everything cached for a user.
pub fn user_pattern(user_id: Uuid) -> String {
    format!("{PREFIX}:user:{user_id}*")
}

// ── Todo keys ──────────────────────────────────────────────

/// Cache key for a todo entity by ID.
pub fn todo_by_id(todo_id: Uuid) -> String {
    format!("{PREFIX}:todo:{todo_id}")
}

/// Cache key for one page of a user's todo list.
pub fn todo_list(user_id: Uuid, completed: Option<bool>, page: u64) -> String {
    let filter = match completed {
        Some(true) => "done",
        Some(false) => "open",
        None => "all",
    };
    format!("{PREFIX}:todos:{user_id}:{filter}:p{page}")
}

/// Pattern to invalidate every cached todo list of a user.
pub fn todo_list_pattern(user_id: Uuid) -> String {
    format!("{PREFIX}:todos:{user_id}:*")
}

// ── Auth keys ──────────────────────────────────────────────

/// Cache key for a blocklisted access-token ID.
pub fn jwt_blocklist(jti: Uuid) -> String {
    format!("{PREFIX}:jwt:blocked:{jti}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_list_key_includes_filter_and_page() {
        let id = Uuid::nil();
        assert_eq!(
            todo_list(id, Some(false), 2),
            "taskhub:todos:00000000-0000-0000-0000-000000000000:open:p2"
        );
        assert!(todo_list(id, None, 1).ends_with(":all:p1"));
    }

    #[test]
    fn patterns_cover_their_keys() {
        let id = Uuid::nil();
        let pattern = todo_list_pattern(id);
        let key = todo_list(id, Some(true), 3);
        assert!(key.starts_with(pattern.trim_end_matches('*')));
    }
}
