// Composition error taxonomy
//
// Every variant is fatal: composition aborts synchronously and no partial
// resource description is committed. There is no retry policy at this layer.

use thiserror::Error;

use crate::types::Operation;

pub type ComposeResult<T> = Result<T, ComposeError>;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// Malformed input: duplicate or conflicting index/key names, empty
    /// names, empty handler entries. Detected before any resource is created.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A resource with this logical id was already provisioned in this
    /// composition. Never silently merged.
    #[error("resource '{0}' is already provisioned")]
    DuplicateResource(String),

    /// A step ran out of order, or against a resource that was never
    /// created. Programming error, not a recoverable condition.
    #[error("'{operation}' requires '{requires}' first (current: {current})")]
    MissingPrerequisite {
        operation: &'static str,
        requires: &'static str,
        current: String,
    },

    /// A handle was read before the stage that produces it completed.
    #[error("'{accessor}' is not available before '{stage}' has run")]
    NotInitialized {
        accessor: &'static str,
        stage: &'static str,
    },

    /// The target of a policy derivation does not resolve to a concrete
    /// addressable resource.
    #[error("cannot resolve an address for resource '{0}'")]
    UnresolvedResource(String),

    /// The privileged-group link was invoked without a role handle.
    #[error("privileged group link requires a role handle")]
    MissingRole,

    /// A table produced an integration for an operation the route table
    /// never declared. Surfaced at composition time, never dropped.
    #[error("no route declared for '{operation}' on table '{table}'")]
    RouteNotDeclared { table: String, operation: Operation },

    /// The service manifest could not be read or parsed.
    #[error("invalid service manifest: {0}")]
    Manifest(String),
}

impl ComposeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ComposeError::Configuration(message.into())
    }

    pub fn duplicate_index(table: &str, index: &str) -> Self {
        ComposeError::Configuration(format!(
            "table '{}': index attribute '{}' collides with another index or key",
            table, index
        ))
    }

    pub fn duplicate_resource(id: impl Into<String>) -> Self {
        ComposeError::DuplicateResource(id.into())
    }

    pub fn missing_prerequisite(
        operation: &'static str,
        requires: &'static str,
        current: impl Into<String>,
    ) -> Self {
        ComposeError::MissingPrerequisite {
            operation,
            requires,
            current: current.into(),
        }
    }

    pub fn not_initialized(accessor: &'static str, stage: &'static str) -> Self {
        ComposeError::NotInitialized { accessor, stage }
    }

    pub fn unresolved_resource(id: impl Into<String>) -> Self {
        ComposeError::UnresolvedResource(id.into())
    }

    pub fn route_not_declared(table: impl Into<String>, operation: Operation) -> Self {
        ComposeError::RouteNotDeclared {
            table: table.into(),
            operation,
        }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        ComposeError::Manifest(message.into())
    }
}
