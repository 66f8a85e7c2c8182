//! Composition root.
//!
//! Sequences the policy set, the identity provider and the table
//! provisioners, then binds every route integration onto the HTTP surface
//! with the authorizer attached. This is the only layer that owns actual
//! route objects and the only layer allowed to grant cross-cutting
//! permissions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, ComposeResult};
use crate::handler::HandlerRef;
use crate::http::{HttpMethod, RouteTable};
use crate::identity::IdentityProvider;
use crate::policy::{self, PolicySet};
use crate::resource::context::{Composition, Deployment, RouteRecord};
use crate::table::{GenericTable, TableSpec};
use crate::types::Operation;

/// One table plus the routes it is served on.
#[derive(Debug, Clone)]
pub struct TableUnit {
    pub spec: TableSpec,
    pub routes: RouteTable,
}

/// Everything the composition root needs to build one deployable unit.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub tables: Vec<TableUnit>,
}

/// Run one full composition and synthesize the deployment description.
///
/// Fails fatally on the first error; a failed composition hands back no
/// partial description.
pub fn compose(spec: &ServiceSpec) -> ComposeResult<Deployment> {
    if spec.name.is_empty() {
        return Err(ComposeError::configuration("service name must not be empty"));
    }
    let max_tables = crate::config::config().limits.max_tables;
    if spec.tables.len() > max_tables {
        return Err(ComposeError::configuration(format!(
            "service '{}': {} tables exceeds the limit of {}",
            spec.name,
            spec.tables.len(),
            max_tables
        )));
    }

    let mut cx = Composition::new(&spec.name);

    // Media store and the privileged role built from its upload statement.
    let media = cx.create_object_store(&format!("{}-media", spec.name))?;
    let policies = PolicySet::new(&media)?;
    let admin_role = cx.create_role("admin", vec![policies.upload_media.clone()])?;

    let identity = IdentityProvider::initialize(&mut cx, &spec.name, Some(&admin_role))?;
    let directory_id = identity.directory_id()?.to_string();
    let authorizer = identity.authorizer()?.clone();

    for unit in &spec.tables {
        let mut table_spec = unit.spec.clone();
        table_spec.directory_id = Some(directory_id.clone());
        let table = GenericTable::provision(&mut cx, &table_spec)?;

        // The create path also administers directory users. This is the one
        // documented cross-operation exception; the table provisioner never
        // infers it.
        if let Some(create) = table.bindings.get(&Operation::Create) {
            let statement = policy::directory_user_admin(identity.directory()?)?;
            cx.grant_statement(&create.handler, identity.directory()?.id(), statement)?;
        }

        for (operation, integration) in &table.integrations {
            let Some(method) = unit.routes.method_for(*operation) else {
                return Err(ComposeError::route_not_declared(&table_spec.name, *operation));
            };
            let authorizer_id = if unit.routes.is_public(*operation) {
                None
            } else {
                Some(authorizer.id().to_string())
            };
            cx.bind_route(RouteRecord {
                path: unit.routes.base_path.clone(),
                method,
                operation: *operation,
                table: table_spec.name.clone(),
                integration: integration.handler.id().to_string(),
                authorizer: authorizer_id,
            })?;
        }

        // Declared routes without a handler are tolerated; the operation
        // simply is not provisioned.
        for operation in unit.routes.operations() {
            if !table.integrations.contains_key(&operation) {
                tracing::warn!(
                    table = %table_spec.name,
                    operation = %operation,
                    "route declared for an operation with no handler"
                );
            }
        }
    }

    Ok(cx.synth())
}

// --- Service manifest -------------------------------------------------------

/// Route block of a table manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesManifest {
    pub base_path: String,
    #[serde(default)]
    pub methods: BTreeMap<Operation, HttpMethod>,
    #[serde(default)]
    pub public: Vec<Operation>,
}

/// One table entry of the service manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableManifest {
    pub name: String,
    pub primary_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub secondary_indexes: Vec<String>,
    #[serde(default)]
    pub handlers: BTreeMap<Operation, String>,
    pub routes: RoutesManifest,
}

/// Declarative YAML surface consumed by the command line. Contains no
/// provisioning logic; it only folds into a [`ServiceSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub service: String,
    pub tables: Vec<TableManifest>,
}

impl ServiceManifest {
    pub fn from_yaml(input: &str) -> ComposeResult<Self> {
        serde_yaml::from_str(input).map_err(|e| ComposeError::manifest(e.to_string()))
    }

    pub fn load(path: &Path) -> ComposeResult<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| {
            ComposeError::manifest(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&input)
    }

    pub fn into_service_spec(self) -> ServiceSpec {
        let tables = self
            .tables
            .into_iter()
            .map(|table| {
                let mut spec = TableSpec::new(table.name, table.primary_key, table.sort_key);
                spec.secondary_indexes = table.secondary_indexes;
                for (operation, entry) in table.handlers {
                    spec.handlers.insert(operation, HandlerRef::new(entry));
                }
                let mut routes = RouteTable::new(table.routes.base_path);
                for (operation, method) in table.routes.methods {
                    routes = if table.routes.public.contains(&operation) {
                        routes.with_public_route(operation, method)
                    } else {
                        routes.with_route(operation, method)
                    };
                }
                TableUnit { spec, routes }
            })
            .collect();
        ServiceSpec {
            name: self.service,
            tables,
        }
    }
}
