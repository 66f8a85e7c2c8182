//! The table provisioning steps.
//!
//! Each step is a pure transformation over the table data model given a
//! resource-creation capability, so duplicate names, sparse handler sets and
//! grant shapes are all testable without real cloud resources. The
//! [`GenericTable`] wrapper runs the steps in order for callers that want
//! the whole pipeline at once.

use std::collections::BTreeMap;

use crate::error::ComposeResult;
use crate::policy;
use crate::resource::{HandlerEnv, ResourceProvider};
use crate::table::{
    HandlerBinding, PermissionGrant, RouteIntegration, StorageResource, TableSpec,
    ENV_DIRECTORY_ID, ENV_PRIMARY_KEY, ENV_TABLE_NAME,
};
use crate::types::Operation;

pub struct TableProvisioner<'a, P: ResourceProvider> {
    provider: &'a mut P,
}

impl<'a, P: ResourceProvider> TableProvisioner<'a, P> {
    pub fn new(provider: &'a mut P) -> Self {
        Self { provider }
    }

    /// Validate the spec, then create the keyed store and one secondary
    /// index per declared attribute. Validation runs to completion before
    /// the first resource is created; a rejected spec commits nothing.
    pub fn provision(&mut self, spec: &TableSpec) -> ComposeResult<StorageResource> {
        spec.validate()?;
        let handle =
            self.provider
                .create_keyed_store(&spec.name, &spec.primary_key, &spec.sort_key)?;
        for index in &spec.secondary_indexes {
            self.provider.add_index(&handle, index)?;
        }
        tracing::debug!(
            table = %spec.name,
            indexes = spec.secondary_indexes.len(),
            "provisioned keyed store"
        );
        // Sorted, so the resulting resource identity is independent of the
        // order indexes were declared in.
        let mut indexes = spec.secondary_indexes.clone();
        indexes.sort();
        Ok(StorageResource {
            handle,
            name: spec.name.clone(),
            primary_key: spec.primary_key.clone(),
            sort_key: spec.sort_key.clone(),
            indexes,
        })
    }

    /// Create one handler binding per operation kind present in the spec.
    /// Absent kinds produce no binding, no grant and no integration.
    pub fn bind_handlers(
        &mut self,
        spec: &TableSpec,
        storage: &StorageResource,
    ) -> ComposeResult<BTreeMap<Operation, HandlerBinding>> {
        let mut bindings = BTreeMap::new();
        for (operation, entry) in &spec.handlers {
            let mut environment = HandlerEnv::new();
            environment.insert(ENV_TABLE_NAME.to_string(), storage.name().to_string());
            environment.insert(ENV_PRIMARY_KEY.to_string(), storage.primary_key().to_string());
            if let Some(directory_id) = &spec.directory_id {
                environment.insert(ENV_DIRECTORY_ID.to_string(), directory_id.clone());
            }
            let handler = self.provider.create_handler(entry, &environment)?;
            tracing::debug!(table = %spec.name, operation = %operation, handler = handler.id(), "bound handler");
            bindings.insert(
                *operation,
                HandlerBinding {
                    operation: *operation,
                    handler,
                    artifact: entry.artifact_id(),
                    environment,
                },
            );
        }
        Ok(bindings)
    }

    /// Apply the minimal action set for each binding's operation kind
    /// against the storage resource. Cross-operation needs are not inferred
    /// here; the composition root grants those explicitly.
    pub fn grant_permissions(
        &mut self,
        bindings: &BTreeMap<Operation, HandlerBinding>,
        storage: &StorageResource,
    ) -> ComposeResult<Vec<PermissionGrant>> {
        let mut grants = Vec::with_capacity(bindings.len());
        for binding in bindings.values() {
            let actions = policy::actions_for(binding.operation);
            self.provider.grant(&binding.handler, storage.handle(), &actions)?;
            grants.push(PermissionGrant {
                subject: binding.handler.id().to_string(),
                object: storage.handle().id().to_string(),
                actions,
            });
        }
        Ok(grants)
    }

    /// One integration handle per binding, authorization left unattached.
    pub fn route_integrations(
        &self,
        bindings: &BTreeMap<Operation, HandlerBinding>,
    ) -> BTreeMap<Operation, RouteIntegration> {
        bindings
            .iter()
            .map(|(operation, binding)| {
                (
                    *operation,
                    RouteIntegration {
                        operation: *operation,
                        handler: binding.handler.clone(),
                    },
                )
            })
            .collect()
    }
}

/// One table, fully wired: storage, bindings, grants and integrations.
/// Runs validate -> provision -> bind -> grant -> integrate in order.
pub struct GenericTable {
    pub storage: StorageResource,
    pub bindings: BTreeMap<Operation, HandlerBinding>,
    pub grants: Vec<PermissionGrant>,
    pub integrations: BTreeMap<Operation, RouteIntegration>,
}

impl GenericTable {
    pub fn provision<P: ResourceProvider>(
        provider: &mut P,
        spec: &TableSpec,
    ) -> ComposeResult<Self> {
        let mut provisioner = TableProvisioner::new(provider);
        let storage = provisioner.provision(spec)?;
        let bindings = provisioner.bind_handlers(spec, &storage)?;
        let grants = provisioner.grant_permissions(&bindings, &storage)?;
        let integrations = provisioner.route_integrations(&bindings);
        Ok(Self {
            storage,
            bindings,
            grants,
            integrations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;
    use crate::handler::HandlerRef;
    use crate::resource::context::{Composition, ResourceEntry};

    fn users_spec() -> TableSpec {
        TableSpec::new("users", "PK", "SK")
            .with_handler(Operation::Create, HandlerRef::new("lambda/create-user.ts"))
    }

    #[test]
    fn provision_creates_store_with_declared_indexes() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = TableSpec::new("records", "PK", "SK")
            .with_secondary_index("location")
            .with_secondary_index("department");
        let storage = provisioner.provision(&spec).unwrap();
        assert_eq!(storage.name(), "records");
        assert_eq!(storage.primary_key(), "PK");
        assert_eq!(storage.sort_key(), "SK");
        assert_eq!(storage.indexes(), ["department", "location"]);
    }

    #[test]
    fn provision_rejects_duplicates_before_creating_anything() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = TableSpec::new("records", "PK", "SK")
            .with_secondary_index("location")
            .with_secondary_index("location");
        let err = provisioner.provision(&spec).unwrap_err();
        assert!(matches!(err, ComposeError::Configuration(_)));

        // validate-then-commit: nothing was registered
        let deployment = cx.synth();
        assert!(deployment.resources.is_empty());
    }

    #[test]
    fn provision_twice_with_the_same_name_is_a_duplicate_resource() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = users_spec();
        provisioner.provision(&spec).unwrap();
        let err = provisioner.provision(&spec).unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateResource(name) if name == "users"));

        // the first resource is unaffected
        let deployment = cx.synth();
        assert!(matches!(
            deployment.resources.get("users"),
            Some(ResourceEntry::KeyedStore { .. })
        ));
    }

    #[test]
    fn sparse_handler_sets_bind_sparsely() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = users_spec();
        let storage = provisioner.provision(&spec).unwrap();
        let bindings = provisioner.bind_handlers(&spec, &storage).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(bindings.contains_key(&Operation::Create));

        let integrations = provisioner.route_integrations(&bindings);
        assert_eq!(integrations.len(), 1);
        assert!(integrations.contains_key(&Operation::Create));
    }

    #[test]
    fn bindings_carry_table_environment() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = users_spec().with_directory_id("res://svc/directory/svc-users");
        let storage = provisioner.provision(&spec).unwrap();
        let bindings = provisioner.bind_handlers(&spec, &storage).unwrap();
        let binding = &bindings[&Operation::Create];
        assert_eq!(
            binding.artifact,
            HandlerRef::new("lambda/create-user.ts").artifact_id()
        );
        assert_eq!(binding.environment[ENV_TABLE_NAME], "users");
        assert_eq!(binding.environment[ENV_PRIMARY_KEY], "PK");
        assert_eq!(
            binding.environment[ENV_DIRECTORY_ID],
            "res://svc/directory/svc-users"
        );
    }

    #[test]
    fn read_bindings_are_granted_read_actions_only() {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = TableSpec::new("records", "PK", "SK")
            .with_handler(Operation::Read, HandlerRef::new("lambda/search-record.ts"));
        let storage = provisioner.provision(&spec).unwrap();
        let bindings = provisioner.bind_handlers(&spec, &storage).unwrap();
        let grants = provisioner.grant_permissions(&bindings, &storage).unwrap();

        assert_eq!(grants.len(), 1);
        assert!(!grants[0].actions.has_write_action());
        for action in crate::policy::STORE_READ_ACTIONS {
            assert!(grants[0].actions.contains(action));
        }
    }
}
