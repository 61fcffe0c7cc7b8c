//! Refresh-token rotation state machine and sweeper.

pub mod records;
pub mod secret;
pub mod store;
pub mod sweeper;

pub use records::TokenRecords;
pub use store::{IssuedToken, TokenStore};
pub use sweeper::TokenSweeper;
