//! Session lifecycle orchestration.

pub mod manager;

pub use manager::{LoginResult, SessionManager, SessionTokens};
