//! Permission policy derivation.
//!
//! Statements are allow-only and scoped to exactly one action set and one
//! resource address pattern. Derivation is pure; applying a statement is the
//! composition context's business.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, ComposeResult};
use crate::resource::{DirectoryHandle, ObjectStoreHandle, ResourceAddress};
use crate::types::Operation;

/// Actions a handler needs to read from a keyed store.
pub const STORE_READ_ACTIONS: &[&str] = &[
    "store:GetItem",
    "store:Query",
    "store:Scan",
    "store:BatchGetItem",
];

/// Actions a handler needs to write to a keyed store.
pub const STORE_WRITE_ACTIONS: &[&str] = &[
    "store:PutItem",
    "store:UpdateItem",
    "store:DeleteItem",
    "store:BatchWriteItem",
];

/// Directory user-administration actions; granted by the composition root to
/// the create path as an explicit cross-cutting exception.
pub const DIRECTORY_USER_ADMIN_ACTIONS: &[&str] = &[
    "directory:AdminCreateUser",
    "directory:AdminSetUserPassword",
    "directory:AdminAddUserToGroup",
];

/// Object-store upload actions backing the privileged role.
pub const OBJECT_UPLOAD_ACTIONS: &[&str] = &["objects:PutObject", "objects:PutObjectAcl"];

/// A deduplicated, ordered set of action names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet(BTreeSet<String>);

impl ActionSet {
    pub fn from_slice(actions: &[&str]) -> Self {
        Self(actions.iter().map(|a| a.to_string()).collect())
    }

    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    /// True when the set contains any store write action.
    pub fn has_write_action(&self) -> bool {
        STORE_WRITE_ACTIONS.iter().any(|a| self.contains(a))
    }
}

pub fn read_actions() -> ActionSet {
    ActionSet::from_slice(STORE_READ_ACTIONS)
}

pub fn write_actions() -> ActionSet {
    ActionSet::from_slice(STORE_WRITE_ACTIONS)
}

/// Minimal action set for an operation kind. Write-capable operations get
/// write actions only; read gets read actions only, never both.
pub fn actions_for(operation: Operation) -> ActionSet {
    if operation.is_write() {
        write_actions()
    } else {
        read_actions()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
}

/// An allow-only statement over one resource address pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: ActionSet,
    pub resources: Vec<String>,
}

/// Derive an allow statement scoped to exactly `actions` on `address` plus
/// all of its sub-objects.
pub fn derive_policy(address: &ResourceAddress, actions: &ActionSet) -> ComposeResult<PolicyStatement> {
    if !address.is_resolved() {
        return Err(ComposeError::unresolved_resource(address.to_string()));
    }
    if actions.is_empty() {
        return Err(ComposeError::configuration("policy statement with an empty action set"));
    }
    Ok(PolicyStatement {
        effect: Effect::Allow,
        actions: actions.clone(),
        resources: vec![address.as_str().to_string(), address.sub_objects()],
    })
}

/// Grant the directory user-administration actions on a directory.
pub fn directory_user_admin(directory: &DirectoryHandle) -> ComposeResult<PolicyStatement> {
    derive_policy(
        directory.address(),
        &ActionSet::from_slice(DIRECTORY_USER_ADMIN_ACTIONS),
    )
}

/// Prepared statements the composition root grants outside the per-operation
/// derivation.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub upload_media: PolicyStatement,
}

impl PolicySet {
    pub fn new(media_store: &ObjectStoreHandle) -> ComposeResult<Self> {
        Ok(Self {
            upload_media: derive_policy(
                media_store.address(),
                &ActionSet::from_slice(OBJECT_UPLOAD_ACTIONS),
            )?,
        })
    }
}
