//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::http::response::CannedResponse;

/// Root configuration of a route tree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Response for requests no route matches.
    pub not_found: CannedResponseConfig,

    /// Response for controlled errors no error route catches.
    pub unhandled: CannedResponseConfig,

    /// Log the listing of every compiled route at debug level.
    pub log_listings: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            not_found: CannedResponseConfig::new(404),
            unhandled: CannedResponseConfig::new(500),
            log_listings: false,
        }
    }
}

/// Fixed response shared by every request that receives it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CannedResponseConfig {
    pub status: u16,

    #[serde(default)]
    pub body: String,
}

impl CannedResponseConfig {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// `None` when the status is outside the valid range.
    pub fn to_response(&self) -> Option<CannedResponse> {
        let status = StatusCode::from_u16(self.status).ok()?;
        Some(CannedResponse::new(status, self.body.clone()))
    }
}
