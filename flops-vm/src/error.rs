//! Error types for flops-vm.

use thiserror::Error;

/// Errors raised by a provider client.
///
/// A mutating call that the provider rejects is not an error at this level;
/// it comes back as [`crate::clients::ApiResponse::Failed`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a usable response.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a body that does not decode.
    #[error("{path}: undecodable response: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The provider answered a read with a non-OK status.
    #[error("{call} failed: {message}")]
    Api { call: &'static str, message: String },

    /// The provider answered OK but left out the payload.
    #[error("{0}: response has no result")]
    MissingResult(&'static str),
}

/// Fatal errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Delete requested for a VM that does not exist.
    #[error("cannot find resource by name: {0}")]
    NotFound(String),

    /// The provider refused the create call outright.
    #[error("create rejected: {0}")]
    CreateRejected(String),

    /// The create operation reached the ERROR state.
    #[error("operation {operation_id} finished with ERROR")]
    OperationFailed { operation_id: u64 },

    /// The operation reported OK without a VM id.
    #[error("operation {operation_id} finished without a vm id")]
    MissingVmId { operation_id: u64 },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Invalid desired spec, caught at the boundary before reconciling.
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("invalid state '{0}', expected present or absent")]
    InvalidState(String),

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: f64,
        value: f64,
    },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;
