//! Couchlet Client Library
//!
//! Async HTTP client for document databases speaking the CouchDB REST API.

mod client;
mod diagnostics;
mod request;

pub use client::{Client, EnsureDb, WriteOptions};
pub use couchlet_core::{ClientConfig, ConnectionDescriptor, Document, Existence};
pub use diagnostics::{DiagnosticSink, NoopSink, TracingSink};
pub use request::{Outcome, RawResponse};
pub use reqwest::Method;

use couchlet_core::DescriptorError;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{}", service_message(.error, .reason))]
    Service {
        error: String,
        reason: Option<String>,
        body: Value,
        response: RawResponse,
    },

    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        response: RawResponse,
    },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid connection URL: {0}")]
    Connection(#[from] DescriptorError),
}

fn service_message(error: &str, reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("{}\n{}", error, reason),
        None => error.to_string(),
    }
}

impl ClientError {
    /// Raw response behind a service or status failure
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            ClientError::Service { response, .. } | ClientError::Status { response, .. } => {
                Some(response)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => self.response().map(|r| r.status),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for a revision conflict reported by the service
    pub fn is_conflict(&self) -> bool {
        match self {
            ClientError::Service { error, .. } => error == "conflict",
            other => other.status() == Some(409),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
