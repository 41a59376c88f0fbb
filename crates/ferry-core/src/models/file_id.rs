use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::FILE_ID_LEN;
use crate::error::AppError;

/// Eight decimal digits; the last is the sum of the first seven mod 10.
///
/// The checksum catches typos in shared links. It is not an access control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "12345678")]
pub struct FileId(String);

impl FileId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.len() != FILE_ID_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "File ID must be exactly {} digits",
                FILE_ID_LEN
            )));
        }

        let digits: Vec<u32> = raw.bytes().map(|b| u32::from(b - b'0')).collect();
        let expected = checksum(&digits[..FILE_ID_LEN - 1]);
        if digits[FILE_ID_LEN - 1] != expected {
            return Err(AppError::InvalidInput(
                "File ID checksum digit is invalid".to_string(),
            ));
        }

        Ok(Self(raw.to_string()))
    }

    /// Builds a valid ID from its first seven digits.
    pub fn from_prefix(prefix: &str) -> Result<Self, AppError> {
        if prefix.len() != FILE_ID_LEN - 1 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "File ID prefix must be exactly {} digits",
                FILE_ID_LEN - 1
            )));
        }
        let digits: Vec<u32> = prefix.bytes().map(|b| u32::from(b - b'0')).collect();
        Ok(Self(format!("{}{}", prefix, checksum(&digits))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn checksum(digits: &[u32]) -> u32 {
    digits.iter().sum::<u32>() % 10
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FileId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
