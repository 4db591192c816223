//! NoETL Worker Runtime
//!
//! Leases queue items from the broker's Queue Service, renders and
//! dispatches the tool they name, and reports the outcome back.
//!
//! This crate provides:
//! - `POST /queue/lease|heartbeat|complete|fail` client
//! - Semaphore-bounded lease/execute/report loop
//! - Tool dispatch via the `noetl-tools` registry

pub mod client;
pub mod config;
pub mod executor;
pub mod worker;

pub use config::WorkerConfig;
pub use worker::Worker;
