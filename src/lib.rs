//! Declarative HTTP mock server.
//!
//! Serves canned responses for a list of `(method, path)` routes read from a
//! JSON route file, with optional simulated latency per route.
//!
//! # Features
//!
//! - **Static Responses**: Fixed status, headers and JSON body per route
//! - **Latency Simulation**: Constant, normal or uniform delays
//! - **Path Parameters**: `/users/{id}` and `/users/:id` patterns
//! - **Startup Validation**: Bad latency payloads, status codes or headers
//!   are rejected before the server accepts traffic
//!
//! # Example Route File
//!
//! ```json
//! [
//!   {
//!     "path": "/users/:id",
//!     "method": "GET",
//!     "status_code": 200,
//!     "header": {"X-Mock-Server": "true"},
//!     "body": {"id": 1},
//!     "response_offset_mode": "normal",
//!     "response_offset": {"mean": 100, "std": 10}
//!   }
//! ]
//! ```

pub mod compiler;
pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod latency;
pub mod server;

pub use compiler::{MethodTable, RouteCompiler};
pub use config::{RouteEntry, RouteFile, ServerSettings};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, ConfigShapeError, SettingsError};
pub use latency::{LatencyOffset, LatencyPolicy, LatencyRegistry};
pub use server::MockServer;
