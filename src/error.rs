//! Error types for the benefit navigator engine.

use crate::profile::{FieldSource, ProfileField};
use crate::workflow::Stage;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems found while loading or validating the program catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog contains no programs")]
    Empty,

    #[error("Duplicate program id: {id}")]
    DuplicateProgram { id: String },

    #[error("Program {program} compares non-numeric field {field} against a threshold")]
    NonNumericThreshold { program: String, field: ProfileField },

    #[error("Program {program} expects unrecognized value {value:?} for {field}")]
    UnrecognizedOption {
        program: String,
        field: ProfileField,
        value: String,
    },

    #[error("Program {program} has no English name")]
    MissingName { program: String },

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Problems found while loading or validating a conversation script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Field {field} appears more than once in the script")]
    DuplicateField { field: ProfileField },

    #[error("Validator {validator} cannot collect field {field}")]
    IncompatibleValidator { field: ProfileField, validator: String },

    #[error("Script never asks for {field}, which the catalog requires")]
    UncoveredField { field: ProfileField },

    #[error("Invalid script JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A conversation answer failed its field validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Answer is empty")]
    Empty,

    #[error("Expected a number, got {input:?}")]
    NotNumeric { input: String },

    #[error("Expected a non-negative number, got {input:?}")]
    Negative { input: String },

    #[error("Expected at least {min}, got {value}")]
    BelowMinimum { min: u32, value: u32 },

    #[error("Unrecognized option {input:?}, expected one of {expected:?}")]
    UnrecognizedOption {
        input: String,
        expected: Vec<&'static str>,
    },
}

/// Writes to the profile that break field ownership.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Field {field} was set by {owner} and needs explicit confirmation to change")]
    Owned {
        field: ProfileField,
        owner: FieldSource,
    },

    #[error("Value of the wrong kind for field {field}")]
    KindMismatch { field: ProfileField },
}

/// Conversation controller misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("Sequence error: {reason}")]
    Sequence { reason: String },

    #[error("Field {field} is not collected by this conversation")]
    NotInScript { field: ProfileField },

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Workflow state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Event {event} is not allowed in stage {stage}")]
    InvalidTransition { stage: Stage, event: &'static str },

    #[error("Invalid payload for {event} in stage {stage}: {reason}")]
    InvalidPayload {
        stage: Stage,
        event: &'static str,
        reason: String,
    },

    #[error("Rejected {event}: another transition is still in progress")]
    ConcurrentTransition { event: &'static str },

    #[error("Result for generation {generation} arrived after reset to generation {current}")]
    StaleResult { generation: u64, current: u64 },

    #[error("Program {id} is not among the matched programs")]
    UnknownProgram { id: String },

    #[error("{operation} stopped before finishing: {reason}")]
    Aborted {
        operation: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Document intake errors.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Extractor {extractor} does not accept documents of type {media_type}")]
    UnsupportedDocument {
        extractor: String,
        media_type: String,
    },

    #[error("Extraction failed for {file_name}: {reason}")]
    ExtractionFailed { file_name: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
