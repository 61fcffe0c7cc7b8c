//! # taskhub-entity
//!
//! Domain entity models for TaskHub: users, todos, refresh-token
//! records, and background jobs. All row-mapped types derive
//! `sqlx::FromRow` and serde traits.

pub mod job;
pub mod todo;
pub mod token;
pub mod user;
