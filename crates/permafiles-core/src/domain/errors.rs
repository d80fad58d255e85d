//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation failures and invalid transfer state
//! transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid archive number format
    #[error("Invalid archive number: {0}")]
    InvalidArchiveNumber(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Unknown sort option name
    #[error("Unknown sort option: {0}")]
    UnknownSortOption(String),

    /// Unknown permission or access role name
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
