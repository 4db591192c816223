//! Service layer for the NoETL Control Plane.
//!
//! Services encapsulate business logic and coordinate
//! between handlers and database queries.

pub mod catalog;
pub mod credential;
pub mod event;
pub mod execution;
pub mod keychain;
pub mod queue;

pub use catalog::CatalogService;
pub use credential::CredentialService;
pub use event::EventService;
pub use execution::ExecutionService;
pub use keychain::KeychainService;
pub use queue::QueueService;
