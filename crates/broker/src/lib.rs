//! NoETL Broker
//!
//! Event-sourced orchestration core: an append-only event log is the
//! single source of truth; the queue, step snapshots, and iterator
//! frames are all views derived by replaying events for an
//! `execution_id`. The broker is a deterministic function of that log:
//! given the ordered event prefix for an execution it computes the
//! next actions (emit + enqueue).
//!
//! ## Modules
//!
//! - [`config`]: configuration loading from environment variables
//! - [`db`]: database connectivity, models, and queries (event log,
//!   queue, catalog, credentials, iterator frames)
//! - [`engine`]: the broker state machine, transition/guard
//!   evaluation, and iterator fan-out/aggregation
//! - [`error`]: error taxonomy with Axum integration
//! - [`handlers`]: HTTP route handlers (the Execution API)
//! - [`playbook`]: playbook AST types and the canonical-format parser
//! - [`sanitize`]: redaction of sensitive values before persistence
//! - [`services`]: business logic coordinating handlers and queries
//! - [`state`]: shared application state
//! - [`template`]: the Context Renderer (Jinja2-compatible)

pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod playbook;
pub mod result_ext;
pub mod sanitize;
pub mod services;
pub mod state;
pub mod template;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
