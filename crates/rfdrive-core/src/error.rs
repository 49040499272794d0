//! Error types for the reader driver core.
//!
//! This module defines the error taxonomy shared by all rfdrive crates.
//! The variants map directly onto the failure classes of the driver surface:
//! operations attempted without a bound consumer, handoff timeouts, invalid
//! parameters, and faults raised by the hardware or persistence collaborators.

/// Result type alias for reader driver operations.
pub type Result<T> = std::result::Result<T, RfError>;

/// Errors that can occur in the reader driver core.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// An operation was attempted while no consumer is bound to the session.
    #[error("no open connection, call open_connection first")]
    ConnectionRequired,

    /// A connection handoff wait exceeded its deadline.
    #[error("connection handoff timed out after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// An argument or configuration value is invalid.
    ///
    /// Bit-algebra input errors (over-long integer conversions, odd-length
    /// hex strings, out-of-range offsets) are programmer errors and surface
    /// here immediately; they are never retried.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// A hardware-manager or persistence collaborator failed.
    #[error("implementation fault: {0}")]
    Implementation(String),
}

impl RfError {
    /// Create a new connection timeout error.
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Create a new invalid parameter error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    /// Create a new implementation fault error.
    pub fn implementation(message: impl Into<String>) -> Self {
        Self::Implementation(message.into())
    }
}
