//! Synthesizing composition context.
//!
//! One `Composition` accumulates every resource, grant and route of a single
//! composition run, then produces the static [`Deployment`] description that
//! an external deployment mechanism consumes. The context is the in-repo
//! [`ResourceProvider`] implementation; nothing here talks to a real cloud.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{config, Environment};
use crate::error::{ComposeError, ComposeResult};
use crate::handler::HandlerRef;
use crate::http::HttpMethod;
use crate::policy::{derive_policy, ActionSet, PolicyStatement};
use crate::resource::{
    AuthorizerHandle, ClientHandle, DirectoryHandle, HandlerEnv, HandlerHandle, LogicalId,
    ObjectStoreHandle, ResourceAddress, ResourceProvider, RoleHandle, StoreHandle,
};
use crate::table;
use crate::types::Operation;

/// One synthesized resource, keyed by logical id in the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceEntry {
    KeyedStore {
        name: String,
        primary_key: String,
        sort_key: String,
        /// Index name -> partition key attribute. Sorted by name, so the
        /// resource identity does not depend on declaration order.
        indexes: BTreeMap<String, String>,
    },
    Handler {
        name: String,
        entry: HandlerRef,
        artifact: String,
        environment: HandlerEnv,
    },
    Directory {
        name: String,
        self_service_sign_up: bool,
        sign_in_aliases: Vec<String>,
    },
    DirectoryClient {
        name: String,
        directory: LogicalId,
        auth_flows: Vec<String>,
        generate_secret: bool,
    },
    Authorizer {
        name: String,
        directory: LogicalId,
        identity_source: String,
    },
    Role {
        name: String,
        statements: Vec<PolicyStatement>,
    },
    Group {
        name: String,
        directory: LogicalId,
        role: LogicalId,
    },
    ObjectStore {
        name: String,
    },
}

/// A directed permission grant: subject handler, object resource, statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub subject: LogicalId,
    pub object: LogicalId,
    pub statement: PolicyStatement,
}

/// A route bound on the HTTP surface. `authorizer` is absent only for
/// routes explicitly declared public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub path: String,
    pub method: HttpMethod,
    pub operation: Operation,
    pub table: String,
    pub integration: LogicalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<LogicalId>,
}

/// The synthesized deployable unit: every resource, grant, bound route and
/// named output of one composition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub service: String,
    pub run_id: Uuid,
    pub environment: Environment,
    pub synthesized_at: DateTime<Utc>,
    pub resources: BTreeMap<LogicalId, ResourceEntry>,
    pub grants: Vec<GrantRecord>,
    pub routes: Vec<RouteRecord>,
    pub outputs: BTreeMap<String, String>,
}

/// Accumulates one composition run. Steps return newly created handles
/// rather than mutating shared fields elsewhere; the context is the only
/// mutable state in the engine.
#[derive(Debug)]
pub struct Composition {
    service: String,
    run_id: Uuid,
    resources: BTreeMap<LogicalId, ResourceEntry>,
    grants: Vec<GrantRecord>,
    routes: Vec<RouteRecord>,
    outputs: BTreeMap<String, String>,
}

impl Composition {
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let run_id = Uuid::new_v4();
        tracing::debug!(%service, %run_id, "starting composition");
        Self {
            service,
            run_id,
            resources: BTreeMap::new(),
            grants: Vec::new(),
            routes: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn address(&self, kind: &str, name: &str) -> ResourceAddress {
        ResourceAddress::new(&self.service, kind, name)
    }

    /// Register an entry under a logical id. Re-registering an id is a
    /// duplicate-resource failure, never a merge.
    fn register(&mut self, id: LogicalId, entry: ResourceEntry) -> ComposeResult<()> {
        if self.resources.contains_key(&id) {
            return Err(ComposeError::duplicate_resource(id));
        }
        self.resources.insert(id, entry);
        Ok(())
    }

    /// Record a named output of the deployment, e.g. the directory id.
    pub fn add_output(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(key.into(), value.into());
    }

    pub fn create_directory(&mut self, name: &str) -> ComposeResult<DirectoryHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::Directory {
                name: name.to_string(),
                self_service_sign_up: false,
                sign_in_aliases: vec!["username".to_string(), "email".to_string()],
            },
        )?;
        Ok(DirectoryHandle {
            id: name.to_string(),
            address: self.address("directory", name),
        })
    }

    pub fn register_client(
        &mut self,
        name: &str,
        directory: &DirectoryHandle,
    ) -> ComposeResult<ClientHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::DirectoryClient {
                name: name.to_string(),
                directory: directory.id().to_string(),
                auth_flows: vec![
                    "admin_user_password".to_string(),
                    "user_password".to_string(),
                    "user_srp".to_string(),
                    "custom".to_string(),
                ],
                generate_secret: false,
            },
        )?;
        Ok(ClientHandle {
            id: name.to_string(),
            address: self.address("client", name),
        })
    }

    pub fn attach_authorizer(
        &mut self,
        name: &str,
        directory: &DirectoryHandle,
    ) -> ComposeResult<AuthorizerHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::Authorizer {
                name: name.to_string(),
                directory: directory.id().to_string(),
                identity_source: "header:Authorization".to_string(),
            },
        )?;
        Ok(AuthorizerHandle {
            id: name.to_string(),
            address: self.address("authorizer", name),
        })
    }

    pub fn create_role(
        &mut self,
        name: &str,
        statements: Vec<PolicyStatement>,
    ) -> ComposeResult<RoleHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::Role {
                name: name.to_string(),
                statements,
            },
        )?;
        Ok(RoleHandle {
            id: name.to_string(),
            address: self.address("role", name),
        })
    }

    pub fn link_group(
        &mut self,
        name: &str,
        directory: &DirectoryHandle,
        role: &RoleHandle,
    ) -> ComposeResult<()> {
        self.register(
            name.to_string(),
            ResourceEntry::Group {
                name: name.to_string(),
                directory: directory.id().to_string(),
                role: role.id().to_string(),
            },
        )
    }

    pub fn create_object_store(&mut self, name: &str) -> ComposeResult<ObjectStoreHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::ObjectStore {
                name: name.to_string(),
            },
        )?;
        Ok(ObjectStoreHandle {
            id: name.to_string(),
            address: self.address("objects", name),
        })
    }

    /// Record a cross-cutting grant the table provisioner does not know
    /// about, e.g. a create handler administering directory users.
    pub fn grant_statement(
        &mut self,
        subject: &HandlerHandle,
        object: impl Into<LogicalId>,
        statement: PolicyStatement,
    ) -> ComposeResult<()> {
        if !self.resources.contains_key(subject.id()) {
            return Err(ComposeError::missing_prerequisite(
                "grant_statement",
                "create_handler",
                format!("handler '{}' was never created", subject.id()),
            ));
        }
        self.grants.push(GrantRecord {
            subject: subject.id().to_string(),
            object: object.into(),
            statement,
        });
        Ok(())
    }

    /// Bind a route on the HTTP surface. The integration's handler must
    /// already exist in this composition.
    pub fn bind_route(&mut self, route: RouteRecord) -> ComposeResult<()> {
        if !self.resources.contains_key(&route.integration) {
            return Err(ComposeError::missing_prerequisite(
                "bind_route",
                "create_handler",
                format!("handler '{}' was never created", route.integration),
            ));
        }
        tracing::debug!(
            path = %route.path,
            method = %route.method,
            operation = %route.operation,
            public = route.authorizer.is_none(),
            "bound route"
        );
        self.routes.push(route);
        Ok(())
    }

    /// Produce the static deployment description. Consumes the context:
    /// composition runs are not re-entrant.
    pub fn synth(self) -> Deployment {
        tracing::info!(
            service = %self.service,
            resources = self.resources.len(),
            grants = self.grants.len(),
            routes = self.routes.len(),
            "synthesized deployment"
        );
        Deployment {
            service: self.service,
            run_id: self.run_id,
            environment: config().environment.clone(),
            synthesized_at: Utc::now(),
            resources: self.resources,
            grants: self.grants,
            routes: self.routes,
            outputs: self.outputs,
        }
    }
}

impl ResourceProvider for Composition {
    fn create_keyed_store(
        &mut self,
        name: &str,
        primary_key: &str,
        sort_key: &str,
    ) -> ComposeResult<StoreHandle> {
        self.register(
            name.to_string(),
            ResourceEntry::KeyedStore {
                name: name.to_string(),
                primary_key: primary_key.to_string(),
                sort_key: sort_key.to_string(),
                indexes: BTreeMap::new(),
            },
        )?;
        Ok(StoreHandle {
            id: name.to_string(),
            address: self.address("store", name),
        })
    }

    fn add_index(&mut self, store: &StoreHandle, index_attr: &str) -> ComposeResult<()> {
        let entry = self.resources.get_mut(store.id()).ok_or_else(|| {
            ComposeError::missing_prerequisite(
                "add_index",
                "create_keyed_store",
                format!("store '{}' was never created", store.id()),
            )
        })?;
        let ResourceEntry::KeyedStore { name, indexes, .. } = entry else {
            return Err(ComposeError::configuration(format!(
                "resource '{}' is not a keyed store",
                store.id()
            )));
        };
        if indexes.contains_key(index_attr) {
            return Err(ComposeError::duplicate_index(name, index_attr));
        }
        // Each secondary index is keyed on its attribute as its own
        // partition key; no sort key on secondary indexes.
        indexes.insert(index_attr.to_string(), index_attr.to_string());
        Ok(())
    }

    fn create_handler(
        &mut self,
        entry: &HandlerRef,
        env: &HandlerEnv,
    ) -> ComposeResult<HandlerHandle> {
        let name = match env.get(table::ENV_TABLE_NAME) {
            Some(table_name) => format!("{}-{}", table_name, entry.name()),
            None => entry.name().to_string(),
        };
        self.register(
            name.clone(),
            ResourceEntry::Handler {
                name: name.clone(),
                entry: entry.clone(),
                artifact: entry.artifact_id(),
                environment: env.clone(),
            },
        )?;
        let address = self.address("handler", &name);
        Ok(HandlerHandle { id: name, address })
    }

    fn grant(
        &mut self,
        handler: &HandlerHandle,
        store: &StoreHandle,
        actions: &ActionSet,
    ) -> ComposeResult<()> {
        if !self.resources.contains_key(handler.id()) {
            return Err(ComposeError::missing_prerequisite(
                "grant",
                "create_handler",
                format!("handler '{}' was never created", handler.id()),
            ));
        }
        if !self.resources.contains_key(store.id()) {
            return Err(ComposeError::missing_prerequisite(
                "grant",
                "create_keyed_store",
                format!("store '{}' was never created", store.id()),
            ));
        }
        let statement = derive_policy(store.address(), actions)?;
        self.grants.push(GrantRecord {
            subject: handler.id().to_string(),
            object: store.id().to_string(),
            statement,
        });
        Ok(())
    }
}
