//! Todo item entity.

pub mod model;

pub use model::{CreateTodo, Todo, UpdateTodo};
