//! Ferry API Library
//!
//! HTTP handlers, application state and setup for the ferry server.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
