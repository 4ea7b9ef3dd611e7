//! Error types and handling
//!
//! This module provides the error taxonomy for feature merging. Every failure is
//! fatal for the merge in progress: a half-merged feature is never returned.
//! Domain-specific enums (Artifact, Merge, Handler) are wrapped in the main
//! `FeatmergeError` enum for unified error handling.

use thiserror::Error;

/// Artifact coordinate errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Coordinate string is not `group:artifact[:type[:classifier]]:version`
    #[error("Invalid artifact coordinate '{value}': {reason}")]
    InvalidCoordinate { value: String, reason: String },

    /// Start order metadata is not a non-negative integer
    #[error("Invalid start order '{value}' for artifact {artifact}")]
    InvalidStartOrder { artifact: String, value: String },
}

/// Merge conflicts and invariant violations
#[derive(Error, Debug)]
pub enum MergeError {
    /// Two maps disagree on a key and no context override resolves it
    #[error("Can't merge {kind} '{key}' defined twice (as '{incoming}' v.s. '{existing}') and not overridden.")]
    AmbiguousValue {
        kind: String,
        key: String,
        incoming: String,
        existing: String,
    },

    /// Two coordinate-compatible artifacts conflict and no rule selects between them
    #[error("Artifact override rule required to select between these two artifacts {existing} and {incoming}. The rule must be specified for {}", prefixes.join(", "))]
    OverrideRuleRequired {
        existing: String,
        incoming: String,
        prefixes: Vec<String>,
    },

    /// Override selection was requested for artifacts outside one coordinate family
    #[error("Internal error selecting override. No common prefix between {existing} and {incoming}")]
    NoCommonPrefix { existing: String, incoming: String },

    /// Same extension name declared with different kinds
    #[error("Found different types for extension {name} : {target_kind} and {source_kind}")]
    ExtensionKindMismatch {
        name: String,
        target_kind: String,
        source_kind: String,
    },

    /// Same structured extension with a different top-level shape
    #[error("Found different JSON types for extension {name} : {target_shape} and {source_shape}")]
    PayloadShapeMismatch {
        name: String,
        target_shape: String,
        source_shape: String,
    },

    /// Structured extension payload is not valid JSON
    #[error("Invalid JSON payload for extension {name}")]
    InvalidPayload {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Override rule text is not in the rule grammar
    #[error("Invalid artifact override rule '{rule}': {reason}")]
    InvalidOverrideRule { rule: String, reason: String },
}

/// Failures raised by registered merge or post-process handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler rejected the extension or failed while processing it
    #[error("Handler '{handler}' failed on extension {extension}: {message}")]
    Failed {
        handler: String,
        extension: String,
        message: String,
    },
}

/// Merge settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file not found
    #[error("Merge settings file not found: {path}")]
    NotFound { path: String },

    /// Settings file parsing error
    #[error("Failed to parse merge settings: {message}")]
    Parsing { message: String },

    /// Settings file I/O error
    #[error("Failed to read merge settings file")]
    Io(#[from] std::io::Error),
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum FeatmergeError {
    /// Artifact coordinate errors
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Merge conflicts
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Handler failures
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience type alias for Results with FeatmergeError
pub type Result<T> = std::result::Result<T, FeatmergeError>;
