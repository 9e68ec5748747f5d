//! Removable-medium lifecycle
//!
//! State machine, block transport, and the data types shared between the
//! dispatch loop, the watcher, and the diagnostic shell.

pub mod controller;
pub mod transport;
pub mod types;

pub use controller::MediumController;
pub use transport::{BlockTransport, SpiCardTransport};
pub use types::{MediumState, MediumStatus, PresenceEvent};
