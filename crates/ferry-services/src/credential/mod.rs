//! Access-code digests and brute-force limiting.

mod hasher;
mod limiter;

pub use hasher::{Argon2Hasher, CredentialHasher};
pub use limiter::AttemptLimiter;

use subtle::ConstantTimeEq;

/// Constant-time string comparison for secrets such as the admin token.
pub fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
