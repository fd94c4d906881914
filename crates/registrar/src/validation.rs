//! Syntactic validation of candidate names.

use crate::errors::ValidationError;
use edx_types::{fully_qualified, namehash, NameHash};
use std::fmt;

/// Minimum accepted label length, in characters.
pub const MIN_NAME_LENGTH: usize = 4;

/// Keystroke filter: keep only word characters (`[A-Za-z0-9_]`).
///
/// This is applied to the raw input as the user types, before validation
/// ever sees it. It never fails.
pub fn normalize_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// A label that passed [`NameValidator::validate`]. The domain suffix is not
/// part of the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate(String);

impl Candidate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `label.suffix`
    pub fn fully_qualified(&self, suffix: &str) -> String {
        fully_qualified(&self.0, suffix)
    }

    /// Name-hash of the fully qualified name.
    pub fn node(&self, suffix: &str) -> NameHash {
        namehash(&self.fully_qualified(suffix))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result shape exposed to form shells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub normalized: String,
    pub error: Option<ValidationError>,
}

#[derive(Debug, Clone, Copy)]
pub struct NameValidator {
    min_length: usize,
}

impl NameValidator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Rules, in order: required, minimum length after trimming, no dot.
    pub fn validate(&self, raw: &str) -> Result<Candidate, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required);
        }
        if trimmed.chars().count() < self.min_length {
            return Err(ValidationError::TooShort {
                min: self.min_length,
            });
        }
        if trimmed.contains('.') {
            return Err(ValidationError::ContainsDot);
        }
        Ok(Candidate(trimmed.to_string()))
    }

    /// Filter `raw` as the name field does, then validate the result.
    pub fn report(&self, raw: &str) -> ValidationReport {
        let filtered = normalize_input(raw);
        match self.validate(&filtered) {
            Ok(candidate) => ValidationReport {
                normalized: candidate.0,
                error: None,
            },
            Err(error) => ValidationReport {
                normalized: filtered,
                error: Some(error),
            },
        }
    }
}

impl Default for NameValidator {
    fn default() -> Self {
        Self::new(MIN_NAME_LENGTH)
    }
}

/// Validate with the default rules.
pub fn validate(raw: &str) -> Result<Candidate, ValidationError> {
    NameValidator::default().validate(raw)
}
