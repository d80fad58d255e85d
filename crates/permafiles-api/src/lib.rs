//! Permafiles API - HTTP adapter for the archive service
//!
//! Provides [`HttpDispatcher`], the production implementation of the
//! request dispatcher port:
//! - JSON calls wrapped in a `RequestVO` envelope
//! - Multipart content uploads with byte progress
//! - Streamed downloads with byte progress
//!
//! ## Modules
//!
//! - [`client`] - reqwest-based dispatcher
//! - [`payloads`] - request body construction per endpoint

pub mod client;
pub mod payloads;

use thiserror::Error;

pub use client::{HttpDispatcher, UPLOAD_PATH};

/// Errors raised while setting up the dispatcher
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL is not a valid URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
