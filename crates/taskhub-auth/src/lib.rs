//! # taskhub-auth
//!
//! Authentication and session lifecycle for TaskHub.
//!
//! ## Modules
//!
//! - `jwt` — access-token creation, validation, and blocklist management
//! - `password` — Argon2id password hashing and policy enforcement
//! - `token` — refresh-token rotation state machine and sweeper
//! - `session` — session lifecycle orchestration (login, refresh, logout)

pub mod jwt;
pub mod password;
pub mod session;
pub mod token;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use password::{PasswordHasher, PasswordValidator};
pub use session::SessionManager;
pub use token::{TokenRecords, TokenStore, TokenSweeper};
