//! cardhost - removable-storage supervisor for embedded Linux
//!
//! This crate provides the core functionality for cardhost, a small daemon
//! that brings a removable storage medium into and out of service as it is
//! inserted and removed, while a diagnostic shell on the serial console and
//! a status lamp observe the lifecycle concurrently.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod indicator;
pub mod medium;
pub mod probe;
pub mod state;
pub mod utils;
pub mod volume;

pub use error::{AppError, Result};
