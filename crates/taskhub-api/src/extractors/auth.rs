//! `AuthUser` extractor — pulls the access token from the
//! Authorization header, validates it, and injects the request context.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use taskhub_core::error::AppError;
use taskhub_service::context::RequestContext;

use crate::state::AppState;

/// Extracted authenticated user context available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The validated request context.
    pub ctx: RequestContext,
    /// The decoded access-token claims (for logout blocklisting).
    pub claims: taskhub_auth::jwt::Claims,
}

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

        let claims = state.jwt_decoder.decode_access_token(token).await?;

        let ctx = RequestContext::new(claims.user_id(), claims.role, claims.username.clone());

        Ok(AuthUser { ctx, claims })
    }
}
