//! Dispatch engine: scans the store for due jobs, takes per-job distributed
//! locks, delivers webhook callbacks and applies the per-type rescheduling,
//! retry, admission and dead-letter policies.

pub mod admission;
pub mod callback;
pub mod dispatch;
pub mod dlq;
pub mod error;
pub mod schedule;
pub mod worker;

pub use callback::{CallbackClient, CallbackOutcome, HttpCallback};
pub use dispatch::DispatchEngine;
pub use error::{CallbackError, EngineError, Result};
pub use worker::JobWorker;
