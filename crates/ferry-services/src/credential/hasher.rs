use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use ferry_core::AppError;
use rand_core::OsRng;

/// One-way digest for access codes.
pub trait CredentialHasher: Send + Sync {
    fn digest(&self, credential: &str) -> Result<String, AppError>;

    fn verify(&self, credential: &str, digest: &str) -> Result<bool, AppError>;
}

/// Salted Argon2id, stored as a PHC string.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    /// Minimal memory and time cost. Only suitable for tests.
    pub fn low_cost() -> Self {
        Self::with_params(Params::new(1024, 1, 1, None).unwrap_or_default())
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn digest(&self, credential: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(credential.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash access code: {}", e)))
    }

    fn verify(&self, credential: &str, digest: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(digest)
            .map_err(|e| AppError::Internal(format!("Invalid credential digest: {}", e)))?;

        Ok(self
            .argon2()
            .verify_password(credential.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
