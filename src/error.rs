//! Error types for the rate-distortion core.
//!
//! Only data-driven configuration problems are reported through [`RdError`].
//! Programming-contract violations (mismatched kernel widths, out-of-order
//! lambda adjustment, unsupported Hadamard tilings) indicate a bug in the
//! mode-decision caller and abort via `assert!`/`panic!` instead — there is
//! no local recovery for them.

use thiserror::Error;

/// Result type for rate-distortion core operations.
pub type Result<T> = std::result::Result<T, RdError>;

/// Errors raised by configuration and table-maintenance entry points.
#[derive(Debug, Error)]
pub enum RdError {
    /// Bit depth outside the supported 8..=16 range.
    #[error("Unsupported bit depth: {0}")]
    BitDepth(u8),

    /// Block geometry that no kernel family covers.
    #[error("Invalid block size: {width}x{height}")]
    BlockSize { width: u32, height: u32 },

    /// Reshaper-model data required but absent or inconsistent.
    #[error("Reshaper model error: {0}")]
    ReshapeModel(String),

    /// Operation not valid for the configured reshape signal type.
    #[error("Unsupported signal type for operation: {0}")]
    SignalType(String),

    /// Invalid encoder configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}
