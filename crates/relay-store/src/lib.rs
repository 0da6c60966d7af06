//! Persistence layer: the job/threshold data model, the store traits the
//! engine is written against, and the Postgres implementation shared by all
//! scheduler instances.

pub mod error;
pub mod postgres;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use postgres::PgStore;
pub use store::{JobStore, ThresholdStore, ThresholdUpdate};
pub use types::{DeadLetter, Job, JobStatus, MessageType, NewJob, ServiceThreshold};
