//! Validation modules

pub mod upload;

pub use upload::{validate_chunk, validate_credential_format};
