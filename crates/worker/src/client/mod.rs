//! Broker HTTP client.

pub mod control_plane;

pub use control_plane::{ControlPlaneClient, LeasedItem, QueueAckResponse};
