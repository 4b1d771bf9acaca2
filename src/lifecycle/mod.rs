//! Process lifecycle.
//!
//! ```text
//! SIGTERM/SIGINT → Shutdown::trigger → server stops accepting → LogGuard drains sink → exit
//! ```
//!
//! The log sink is closed last so records emitted while connections drain still reach the output.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
