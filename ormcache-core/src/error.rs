//! Error types for the cache coordinator and its collaborators.

use thiserror::Error;

/// Symbolic form of a Dependency Engine status code (see the ABI table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorCode {
    AbiMismatch,
    ContractVersionMismatch,
    SchemaInvalid,
    QueryInvalid,
    ResultShapeMismatch,
    MutationInvalid,
    UnsupportedOperator,
    EngineState,
    Internal,
}

impl EngineErrorCode {
    /// Map a raw ABI status code to its symbolic form.
    ///
    /// Status `0` (OK) has no corresponding variant; callers must not reach
    /// here for a successful call.
    pub fn from_status(status: u32) -> Self {
        match status {
            1 => Self::AbiMismatch,
            2 => Self::ContractVersionMismatch,
            3 => Self::SchemaInvalid,
            4 => Self::QueryInvalid,
            5 => Self::ResultShapeMismatch,
            6 => Self::MutationInvalid,
            7 => Self::UnsupportedOperator,
            8 => Self::EngineState,
            _ => Self::Internal,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AbiMismatch => "ABI_MISMATCH",
            Self::ContractVersionMismatch => "CONTRACT_VERSION_MISMATCH",
            Self::SchemaInvalid => "SCHEMA_INVALID",
            Self::QueryInvalid => "QUERY_INVALID",
            Self::ResultShapeMismatch => "RESULT_SHAPE_MISMATCH",
            Self::MutationInvalid => "MUTATION_INVALID",
            Self::UnsupportedOperator => "UNSUPPORTED_OPERATOR",
            Self::EngineState => "ENGINE_STATE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error surfaced by the Dependency Engine, carrying its status code and message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct EngineError {
    pub code: EngineErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build a synthetic error from just a status code, used when `last_error`
    /// itself cannot be parsed.
    pub fn from_status(status: u32) -> Self {
        let code = EngineErrorCode::from_status(status);
        Self {
            message: format!("engine call failed with status {status} ({code})"),
            code,
        }
    }
}

/// Errors produced while validating or loading an `AppSchema`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema declares no models")]
    NoModels,

    #[error("model at index {index} is missing a name")]
    MissingModelName { index: usize },

    #[error("model {model} declares a composite id with no fields")]
    EmptyCompositeId { model: String },

    #[error("failed to parse schema source: {reason}")]
    ParseFailed { reason: String },

    #[error("failed to read schema file {path}: {reason}")]
    ReadFailed { path: String, reason: String },
}

/// Errors the Engine Client can raise around the ABI boundary itself,
/// independent of the engine's own status codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("payload contains a NUL byte and cannot be sent to the engine")]
    ContainsNul,

    #[error("failed to serialize {what} to JSON: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("failed to decode engine {what} as JSON: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("engine output was not valid UTF-8: {reason}")]
    InvalidUtf8 { reason: String },
}

/// The single-flight promise for a shape timed out before `execute` settled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("single-flight execution for shape {shape_id} timed out after {timeout_ms}ms")]
pub struct SingleFlightTimeoutError {
    pub shape_id: String,
    pub timeout_ms: u64,
}

/// Master error type returned by the coordinator and its collaborators.
///
/// `Db` wraps whatever error type the host's `execute` closure produced,
/// boxed so the coordinator stays generic over the caller's error type.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("{0}")]
    Timeout(#[from] SingleFlightTimeoutError),

    #[error("database operation failed: {0}")]
    Db(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl CacheError {
    /// Wrap an arbitrary `execute()` failure as a `Db` error.
    pub fn db(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Db(Box::new(err))
    }
}

/// Result type alias used throughout the coordinator and collaborators.
pub type CacheResult<T> = Result<T, CacheError>;
