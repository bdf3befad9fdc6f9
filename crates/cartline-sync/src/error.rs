//! # Sync Error Types
//!
//! Error types for engine and gateway operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Local          │  │   Remote        │  │     Configuration       │ │
//! │  │  (caller bug)   │  │   (expected)    │  │                         │ │
//! │  │                 │  │                 │  │  InvalidConfig          │ │
//! │  │  Core(..)       │  │  Network        │  │  InvalidUrl             │ │
//! │  │   DuplicateItem │  │  Timeout        │  │  ConfigLoadFailed       │ │
//! │  │   ItemNotFound  │  │  Conflict       │  │  ConfigSaveFailed       │ │
//! │  │   Validation    │  │  ServerValid.   │  │                         │ │
//! │  │                 │  │  Server, Decode │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Local errors: raised before any optimistic state, never dispatched.   │
//! │  Remote errors: trigger rollback, surfaced to the caller; the engine   │
//! │                 never retries on its own.                              │
//! │  Internal: a panic while handling an edit; rolled back like a remote   │
//! │            failure.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use cartline_core::CoreError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Engine and gateway error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    // =========================================================================
    // Local Errors
    // =========================================================================
    /// The cart aggregate rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The backend could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete in time (elapsed budget in milliseconds).
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The backend's cart changed underneath this session.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend refused the payload.
    #[error("Rejected by server: {}", .errors.join("; "))]
    ServerValidation { errors: Vec<String> },

    /// Any other non-success status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Invalid response payload: {0}")]
    Decode(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// The engine has been shut down.
    #[error("Cart engine is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Handling an edit failed inside the engine itself. The edit was rolled
    /// back and the engine keeps running.
    #[error("Internal engine error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True if the caller may reasonably offer a retry.
    ///
    /// The engine itself never retries; this only drives the UI's retry
    /// affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::Timeout(_)
                | SyncError::Conflict(_)
                | SyncError::Server { .. }
        )
    }

    /// True for failures reported by (or on the way to) the backend.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::Timeout(_)
                | SyncError::Conflict(_)
                | SyncError::ServerValidation { .. }
                | SyncError::Server { .. }
                | SyncError::Decode(_)
        )
    }

    /// True for aggregate contract violations (caller bugs).
    pub fn is_local(&self) -> bool {
        matches!(self, SyncError::Core(_))
    }

    /// True if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
