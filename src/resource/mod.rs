//! Resource handles and the resource-creation capability.
//!
//! The table provisioner depends only on the [`ResourceProvider`] trait,
//! never on a concrete provider API. The in-repo implementation is the
//! synthesizing [`context::Composition`].

pub mod context;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ComposeResult;
use crate::handler::HandlerRef;
use crate::policy::ActionSet;

/// Logical identifier of a resource within one composition.
pub type LogicalId = String;

/// Environment configuration handed to a compute handler at creation time.
pub type HandlerEnv = BTreeMap<String, String>;

/// Addressable location of a provisioned resource, the target pattern for
/// permission statements. Shaped as `res://<service>/<kind>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAddress(String);

impl ResourceAddress {
    pub fn new(service: &str, kind: &str, name: &str) -> Self {
        Self(format!("res://{}/{}/{}", service, kind, name))
    }

    /// An address that does not resolve to a concrete resource. Policy
    /// derivation rejects it.
    pub fn unresolved() -> Self {
        Self(String::new())
    }

    pub fn is_resolved(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address pattern covering the resource plus all of its sub-objects.
    pub fn sub_objects(&self) -> String {
        format!("{}/*", self.0)
    }
}

impl std::fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! resource_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub(crate) id: LogicalId,
            pub(crate) address: ResourceAddress,
        }

        impl $name {
            pub fn id(&self) -> &str {
                &self.id
            }

            pub fn address(&self) -> &ResourceAddress {
                &self.address
            }
        }
    };
}

resource_handle!(
    /// Handle to a provisioned keyed store.
    StoreHandle
);
resource_handle!(
    /// Handle to a provisioned compute handler.
    HandlerHandle
);
resource_handle!(
    /// Handle to a user directory.
    DirectoryHandle
);
resource_handle!(
    /// Handle to a directory client registration.
    ClientHandle
);
resource_handle!(
    /// Opaque capability attached to a route to require a validated
    /// identity claim before invocation.
    AuthorizerHandle
);
resource_handle!(
    /// Handle to a role carrying prepared permission statements.
    RoleHandle
);
resource_handle!(
    /// Handle to an object store.
    ObjectStoreHandle
);

impl DirectoryHandle {
    /// The directory's identifier, handed to handlers as environment
    /// configuration.
    pub fn directory_id(&self) -> &str {
        self.address.as_str()
    }
}

/// Resource-creation capability supplied to the table provisioner.
pub trait ResourceProvider {
    fn create_keyed_store(
        &mut self,
        name: &str,
        primary_key: &str,
        sort_key: &str,
    ) -> ComposeResult<StoreHandle>;

    fn add_index(&mut self, store: &StoreHandle, index_attr: &str) -> ComposeResult<()>;

    fn create_handler(
        &mut self,
        entry: &HandlerRef,
        env: &HandlerEnv,
    ) -> ComposeResult<HandlerHandle>;

    fn grant(
        &mut self,
        handler: &HandlerHandle,
        store: &StoreHandle,
        actions: &ActionSet,
    ) -> ComposeResult<()>;
}
