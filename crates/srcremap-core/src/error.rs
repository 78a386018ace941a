//! Error types and exit codes for srcremap.
//!
//! [`RemapError`] bridges the per-module errors into one type for the CLI.
//! Every variant maps to a stable [`OutputErrorCode`], which is both the
//! process exit code and the `code` field of the JSON error summary.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad flags, malformed range map file)
//! - `3`: Resolution errors (resolver init failure, extraction over tolerance)
//! - `4`: Apply and IO errors (stores, mapping files, output files)
//! - `10`: Internal errors

use std::fmt;
use std::io;

use thiserror::Error;

use crate::extract::{ExtractError, ExtractFailure};
use crate::rangemap::RangeMapError;
use crate::store::StoreError;
use crate::table::TableError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for exit status and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Symbols could not be resolved well enough to trust the range map.
    ResolutionError = 3,
    /// Reading or writing sources, mappings or artifacts failed.
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum RemapError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("extraction failed: {failure}")]
    ExtractionFailed { failure: ExtractFailure },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("mapping error: {0}")]
    Table(#[from] TableError),

    #[error("range map error: {0}")]
    RangeMap(#[from] RangeMapError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{failed} unit(s) could not be remapped")]
    UnitsFailed { failed: usize },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<ExtractError> for RemapError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Store(e) => RemapError::Store(e),
            ExtractError::RangeMap(e) => RemapError::Internal {
                message: format!("extractor produced an inconsistent range map: {}", e),
            },
        }
    }
}

impl From<&RemapError> for OutputErrorCode {
    fn from(err: &RemapError) -> Self {
        match err {
            RemapError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            RemapError::RangeMap(RangeMapError::Malformed { .. }) => {
                OutputErrorCode::InvalidArguments
            }
            RemapError::RangeMap(_) => OutputErrorCode::ApplyError,
            RemapError::ExtractionFailed { .. } => OutputErrorCode::ResolutionError,
            RemapError::Store(_)
            | RemapError::Table(_)
            | RemapError::Io(_)
            | RemapError::UnitsFailed { .. } => OutputErrorCode::ApplyError,
            RemapError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl RemapError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RemapError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RemapError::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
