//! # taskhub-worker
//!
//! Durable background processing for TaskHub:
//!
//! - `queue` — job queue over the database (producer + consumer ops),
//!   including the cascade-delete producer [`queue::PurgeQueue`]
//! - `executor` — handler registry and dispatch
//! - `runner` — the long-running consumer loop
//! - `scheduler` — cron registration for periodic jobs
//! - `jobs` — handlers: purge-user-resources, token sweep, queue
//!   maintenance

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{JobQueue, PurgeQueue};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
