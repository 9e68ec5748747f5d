//! Serial console shell
//!
//! One interactive diagnostic session at a time, kept alive by a respawning
//! supervisor. The command table is read-only over the lifecycle state; the
//! session's line handling is deliberately minimal (no history, no editing
//! beyond backspace).

pub mod commands;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use commands::CommandOutcome;
pub use session::ShellSession;
pub use supervisor::ShellSessionSupervisor;
pub use transport::{ConsoleIo, ConsoleTransport, SerialConsole};
