//! # taskhub-service
//!
//! Business logic services for TaskHub. Services orchestrate
//! repositories, the cache, the auth subsystem, and the purge queue;
//! every database round-trip runs under the admission gate and a
//! bounded deadline.

pub mod context;
pub mod todo;
pub mod user;

pub use context::RequestContext;
pub use todo::TodoService;
pub use user::{AdminService, UserService};
