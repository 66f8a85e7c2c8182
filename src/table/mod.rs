//! Generic table provisioning.
//!
//! One [`TableSpec`] declares an entity type's keyed store, its secondary
//! indexes and its per-operation handlers; the provisioner derives the
//! storage resource, the handler bindings, the least-privilege grants and
//! the route integrations without the caller repeating the wiring.

pub mod provisioner;

pub use provisioner::GenericTable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::error::{ComposeError, ComposeResult};
use crate::handler::HandlerRef;
use crate::policy::ActionSet;
use crate::resource::{HandlerEnv, HandlerHandle, LogicalId, StoreHandle};
use crate::types::Operation;

// Environment keys handed to every bound handler.
pub const ENV_TABLE_NAME: &str = "TABLE_NAME";
pub const ENV_PRIMARY_KEY: &str = "PRIMARY_KEY";
pub const ENV_DIRECTORY_ID: &str = "DIRECTORY_ID";

/// Declarative specification of one table: the entire external contract for
/// invoking the provisioner. `name` is unique and immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub primary_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub secondary_indexes: Vec<String>,
    /// Sparse: absence of an operation kind is the sole signal that its
    /// path is not provisioned.
    #[serde(default)]
    pub handlers: BTreeMap<Operation, HandlerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<String>,
}

impl TableSpec {
    pub fn new(
        name: impl Into<String>,
        primary_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            sort_key: sort_key.into(),
            secondary_indexes: Vec::new(),
            handlers: BTreeMap::new(),
            directory_id: None,
        }
    }

    pub fn with_secondary_index(mut self, attr: impl Into<String>) -> Self {
        self.secondary_indexes.push(attr.into());
        self
    }

    pub fn with_handler(mut self, operation: Operation, handler: HandlerRef) -> Self {
        self.handlers.insert(operation, handler);
        self
    }

    pub fn with_directory_id(mut self, directory_id: impl Into<String>) -> Self {
        self.directory_id = Some(directory_id.into());
        self
    }

    /// Full validation, run before any resource is created. A spec that
    /// passes here commits cleanly; a spec that fails commits nothing.
    pub fn validate(&self) -> ComposeResult<()> {
        if self.name.is_empty() {
            return Err(ComposeError::configuration("table name must not be empty"));
        }
        if self.primary_key.is_empty() || self.sort_key.is_empty() {
            return Err(ComposeError::configuration(format!(
                "table '{}': primary and sort key names must not be empty",
                self.name
            )));
        }
        if self.primary_key == self.sort_key {
            return Err(ComposeError::configuration(format!(
                "table '{}': primary and sort key must be distinct, both are '{}'",
                self.name, self.primary_key
            )));
        }
        let max_indexes = config().limits.max_secondary_indexes;
        if self.secondary_indexes.len() > max_indexes {
            return Err(ComposeError::configuration(format!(
                "table '{}': {} secondary indexes exceeds the limit of {}",
                self.name,
                self.secondary_indexes.len(),
                max_indexes
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        seen.insert(self.primary_key.as_str());
        seen.insert(self.sort_key.as_str());
        for index in &self.secondary_indexes {
            if index.is_empty() {
                return Err(ComposeError::configuration(format!(
                    "table '{}': secondary index attribute must not be empty",
                    self.name
                )));
            }
            if !seen.insert(index.as_str()) {
                return Err(ComposeError::duplicate_index(&self.name, index));
            }
        }
        for (operation, handler) in &self.handlers {
            if handler.entry.is_empty() {
                return Err(ComposeError::configuration(format!(
                    "table '{}': empty handler entry for '{}'",
                    self.name, operation
                )));
            }
        }
        Ok(())
    }
}

/// The provisioned keyed store. Owned 1:1 by its originating spec; never
/// mutated structurally after creation.
#[derive(Debug, Clone)]
pub struct StorageResource {
    handle: StoreHandle,
    name: String,
    primary_key: String,
    sort_key: String,
    indexes: Vec<String>,
}

impl StorageResource {
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// Secondary index attributes, sorted by name.
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }
}

/// One operation kind bound to its compute artifact and environment.
#[derive(Debug, Clone)]
pub struct HandlerBinding {
    pub operation: Operation,
    pub handler: HandlerHandle,
    pub artifact: String,
    pub environment: HandlerEnv,
}

/// A directed grant derived from a binding's operation kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionGrant {
    pub subject: LogicalId,
    pub object: LogicalId,
    pub actions: ActionSet,
}

/// Pairs a handler binding with an invocable HTTP entry point. Carries no
/// authorization; attaching the authorizer is the composition root's call.
#[derive(Debug, Clone)]
pub struct RouteIntegration {
    pub operation: Operation,
    pub handler: HandlerHandle,
}
