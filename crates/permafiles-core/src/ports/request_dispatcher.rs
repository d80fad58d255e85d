//! Request dispatcher port (driven/secondary port)
//!
//! The engines talk to the archive service only through this trait. A call
//! either yields a JSON body, raw bytes, or a typed error carrying a
//! human-readable message.
//!
//! ## Design Notes
//!
//! - JSON answers are returned undecoded; envelope validation happens in the
//!   engines so every adapter gets the same malformed-response handling.
//! - Binary transfers take a progress callback invoked with
//!   `(bytes_done, bytes_total)` as data moves.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::domain::{CsrfToken, RecordId};
use crate::endpoint::Endpoint;

/// Progress callback: `(bytes_done, bytes_total)`
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// A JSON call with the anti-forgery token to send along
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub csrf: Option<CsrfToken>,
}

impl ApiRequest {
    pub fn new(endpoint: Endpoint, csrf: Option<CsrfToken>) -> Self {
        Self { endpoint, csrf }
    }
}

/// Answer to a dispatched call
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    Json(Value),
    Binary(Vec<u8>),
}

/// A binary transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRequest {
    /// Stream a local file as the content of a registered record
    Upload {
        record_id: RecordId,
        path: PathBuf,
        filename: String,
        mime_type: String,
        size: u64,
    },
    /// Fetch the bytes behind a download URL
    Download { url: String },
}

/// Errors returned by a dispatcher
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Connection failure, timeout, or unreadable body
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Request failed with status {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Message extracted from the response
        message: String,
    },

    /// The call was abandoned by the caller
    #[error("Request cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Returns true for failures worth retrying by re-enqueueing
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Cancelled => false,
        }
    }
}

/// Port for executing requests against the archive service
#[async_trait::async_trait]
pub trait IRequestDispatcher: Send + Sync {
    /// Execute a JSON call
    async fn execute(&self, request: ApiRequest) -> Result<DispatchResponse, DispatchError>;

    /// Run a binary transfer, reporting progress as bytes move
    ///
    /// Uploads answer with the JSON envelope of the upload call; downloads
    /// answer with the raw bytes.
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressFn,
    ) -> Result<DispatchResponse, DispatchError>;
}
