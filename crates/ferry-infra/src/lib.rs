//! Ferry Infrastructure Library
//!
//! Shared plumbing for the ferry binary:
//! - Telemetry initialization
//! - Middleware (request ID, security headers)
//! - HTTP error body

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod telemetry;

pub mod error;

#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId, SecurityPolicy,
};

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat, TelemetryOptions};

pub use error::ErrorResponse;
