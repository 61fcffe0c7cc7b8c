//! Todo management service.

pub mod service;

pub use service::TodoService;
