//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (status codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{CannedResponseConfig, DispatchConfig};

/// One rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_canned("not_found.status", &config.not_found, &mut errors);
    check_canned("unhandled.status", &config.unhandled, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_canned(field: &'static str, canned: &CannedResponseConfig, errors: &mut Vec<ValidationError>) {
    if !(100..=999).contains(&canned.status) {
        errors.push(ValidationError {
            field,
            message: format!("{} is not a valid HTTP status", canned.status),
        });
    }
}
