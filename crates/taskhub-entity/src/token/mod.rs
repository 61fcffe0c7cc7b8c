//! Refresh-token record entity and derived rotation state.

pub mod model;

pub use model::{RefreshTokenRecord, TokenState};
