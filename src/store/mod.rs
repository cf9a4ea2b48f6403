//! Durable storage — per-guild config records and FIFO review queues.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{ReconcileReport, Storage};
