//! Error types for the decision network
//!
//! Nothing in here is fatal to the process. Engine operations resolve
//! errors at the boundary where they occur and surface them as values or
//! journal notices; the drain loop never propagates them.

use thiserror::Error;

/// Errors raised by object, rule and action operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No object with this id is registered
    #[error("object {0} not found")]
    ObjectNotFound(String),

    /// No action with this name is registered
    #[error("action {0} not found")]
    ActionNotFound(String),

    /// No rule with this id is registered
    #[error("rule {0} not found")]
    RuleNotFound(String),

    /// A rule or action definition was rejected at registration time
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An effect returned an error or panicked
    #[error("effect of action {action} failed: {reason}")]
    EffectFault { action: String, reason: String },

    /// The action's target-type constraint excludes the object
    #[error("action {action} targets {expected} objects, not {actual}")]
    TargetTypeMismatch {
        action: String,
        expected: String,
        actual: String,
    },

    /// The object's permitted-action set does not include the action
    #[error("object {object} does not permit action {action}")]
    ActionNotPermitted { object: String, action: String },

    /// A provided parameter does not match the action's schema
    #[error("parameter {name} of action {action} expects {expected}, got {actual}")]
    InvalidParameter {
        action: String,
        name: String,
        expected: String,
        actual: String,
    },
}

/// Errors raised by the resource scheduler and project table
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("resource {0} already exists")]
    DuplicateResource(String),

    #[error("resource {0} not found")]
    ResourceNotFound(String),

    #[error("project {0} already exists")]
    DuplicateProject(String),

    #[error("project {0} not found")]
    ProjectNotFound(String),

    /// Allocation table and project table disagree
    #[error("invalid scheduler state: {0}")]
    InvalidState(String),
}

/// Errors returned by an effect implementation
///
/// The dispatcher records these as fault-in-effect notices and moves on
/// to the next effect.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("parameter {name} must be a {expected}")]
    InvalidParameter { name: String, expected: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Custom error from an effect implementation
    #[error("effect failed: {0}")]
    Failed(String),
}

/// Errors raised while loading catalog files
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported catalog format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid definition: {0}")]
    Invalid(#[from] EngineError),

    #[error("invalid resource or project: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Errors raised while lifting raw tool data into ontology objects
#[derive(Debug, Error)]
pub enum LiftError {
    #[error("no mapper registered for source type {0}")]
    UnknownSource(String),

    #[error("{source_type} record is missing field {field}")]
    MissingField { source_type: String, field: String },
}

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
