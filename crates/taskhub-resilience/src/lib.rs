//! # taskhub-resilience
//!
//! Admission control and deadline enforcement for every outbound call.
//!
//! - [`AdmissionGate`] — fixed-capacity, non-blocking permit pool
//!   protecting one downstream resource class. Saturation fails fast
//!   with `ErrorKind::Overloaded`; the guarded operation never starts.
//! - [`BoundedExecutor`] — wraps an operation with a deadline and an
//!   external cancellation signal. Deadline expiry is `ErrorKind::Timeout`,
//!   distinct from caller cancellation.
//! - [`ResiliencePolicy`] — the composition of the two: admission is
//!   checked *before* the deadline clock starts, so rejected calls never
//!   consume timeout budget.
//!
//! Gates are constructed once at the composition root and injected into
//! every consumer; they are never hidden globals.

pub mod executor;
pub mod gate;
pub mod policy;

pub use executor::BoundedExecutor;
pub use gate::{AdmissionGate, GateSnapshot};
pub use policy::ResiliencePolicy;
