//! Maps domain `AppError` to HTTP responses.
//!
//! The `impl IntoResponse for AppError` lives in `taskhub-core` alongside
//! `AppError` itself, because Rust's orphan rule forbids implementing the
//! foreign `axum::response::IntoResponse` trait for the foreign `AppError`
//! type from this crate. The response body type is re-exported here so the
//! API surface (`taskhub_api::error::ApiErrorResponse`) is preserved.

pub use taskhub_core::error::ApiErrorResponse;
