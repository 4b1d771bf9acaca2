//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign / propagate X-Request-ID)
//!     → access_log.rs (time the request, log "request completed")
//!     → server.rs (routes: health, echo, admin)
//!     → Send to client
//! ```

pub mod access_log;
pub mod request;
pub mod server;

pub use access_log::{access_log, AccessLog};
pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
