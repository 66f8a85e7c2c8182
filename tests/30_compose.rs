use anyhow::Result;

use stackwright::compose::{compose, ServiceManifest, ServiceSpec, TableUnit};
use stackwright::error::ComposeError;
use stackwright::handler::HandlerRef;
use stackwright::http::{HttpMethod, RouteTable};
use stackwright::resource::context::ResourceEntry;
use stackwright::table::TableSpec;
use stackwright::types::Operation;

// End-to-end composition: one deployable unit from spec to synthesized
// description, route authorization, and the failure modes the root surfaces.

fn users_service() -> ServiceSpec {
    ServiceSpec {
        name: "users-svc".to_string(),
        tables: vec![TableUnit {
            spec: TableSpec::new("users", "PK", "SK")
                .with_handler(Operation::Create, HandlerRef::new("lambda/create-user.ts")),
            routes: RouteTable::new("/users").with_route(Operation::Create, HttpMethod::Post),
        }],
    }
}

#[test]
fn create_only_table_composes_end_to_end() -> Result<()> {
    let deployment = compose(&users_service())?;

    // storage: keys PK/SK, zero secondary indexes
    let Some(ResourceEntry::KeyedStore {
        primary_key,
        sort_key,
        indexes,
        ..
    }) = deployment.resources.get("users")
    else {
        panic!("expected the 'users' keyed store");
    };
    assert_eq!(primary_key, "PK");
    assert_eq!(sort_key, "SK");
    assert!(indexes.is_empty());

    // exactly one handler binding, configured from the spec
    let Some(ResourceEntry::Handler { environment, .. }) =
        deployment.resources.get("users-create-user")
    else {
        panic!("expected the create handler binding");
    };
    assert_eq!(environment.get("TABLE_NAME").map(String::as_str), Some("users"));
    assert_eq!(environment.get("PRIMARY_KEY").map(String::as_str), Some("PK"));
    assert!(environment.contains_key("DIRECTORY_ID"));

    // exactly one write-only grant against the store
    let store_grants: Vec<_> = deployment
        .grants
        .iter()
        .filter(|g| g.object == "users")
        .collect();
    assert_eq!(store_grants.len(), 1);
    assert_eq!(store_grants[0].subject, "users-create-user");
    assert!(store_grants[0].statement.actions.contains("store:PutItem"));
    assert!(!store_grants[0].statement.actions.contains("store:GetItem"));

    // the documented cross-cutting exception: create also administers
    // directory users, granted by the root rather than the table core
    let directory_grants: Vec<_> = deployment
        .grants
        .iter()
        .filter(|g| g.object == "users-svc-users")
        .collect();
    assert_eq!(directory_grants.len(), 1);
    assert!(directory_grants[0]
        .statement
        .actions
        .contains("directory:AdminCreateUser"));

    // exactly one route, with the authorizer attached
    assert_eq!(deployment.routes.len(), 1);
    let route = &deployment.routes[0];
    assert_eq!(route.path, "/users");
    assert_eq!(route.method, HttpMethod::Post);
    assert_eq!(route.operation, Operation::Create);
    assert_eq!(route.authorizer.as_deref(), Some("users-svc-authorizer"));
    Ok(())
}

#[test]
fn integration_without_a_declared_route_is_a_composition_error() {
    let mut spec = users_service();
    spec.tables[0]
        .spec
        .handlers
        .insert(Operation::Read, HandlerRef::new("lambda/search-record.ts"));
    // routes still only declare create

    let err = compose(&spec).unwrap_err();
    assert!(
        matches!(
            err,
            ComposeError::RouteNotDeclared {
                ref table,
                operation: Operation::Read,
            } if table == "users"
        ),
        "got: {err}"
    );
}

#[test]
fn public_routes_synthesize_without_an_authorizer() -> Result<()> {
    let mut spec = users_service();
    spec.tables[0]
        .spec
        .handlers
        .insert(Operation::Read, HandlerRef::new("lambda/search-record.ts"));
    spec.tables[0].routes = RouteTable::new("/users")
        .with_route(Operation::Create, HttpMethod::Post)
        .with_public_route(Operation::Read, HttpMethod::Get);

    let deployment = compose(&spec)?;
    assert_eq!(deployment.routes.len(), 2);
    for route in &deployment.routes {
        match route.operation {
            Operation::Read => assert!(route.authorizer.is_none()),
            _ => assert!(route.authorizer.is_some()),
        }
    }
    Ok(())
}

#[test]
fn manifest_composes_with_directory_outputs() -> Result<()> {
    let manifest = ServiceManifest::load(std::path::Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/manifests/pto-service.yaml"
    )))?;
    let deployment = compose(&manifest.into_service_spec())?;

    assert_eq!(deployment.service, "pto-service");
    assert!(deployment.outputs.contains_key("DirectoryId"));
    assert!(deployment.outputs.contains_key("DirectoryClientId"));

    // both declared operations are routed under the same base path
    assert_eq!(deployment.routes.len(), 2);
    assert!(deployment.routes.iter().all(|r| r.path == "/pto-service"));

    // the read path got read actions only
    let read_grant = deployment
        .grants
        .iter()
        .find(|g| g.subject == "pto-records-search-record")
        .expect("read grant");
    assert!(read_grant.statement.actions.contains("store:Query"));
    assert!(!read_grant.statement.actions.contains("store:DeleteItem"));
    Ok(())
}

#[test]
fn manifest_loads_from_a_file_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("svc.yaml");
    std::fs::write(
        &path,
        "service: tiny\ntables:\n  - name: notes\n    primary_key: PK\n    sort_key: SK\n    routes:\n      base_path: /notes\n",
    )?;

    let manifest = ServiceManifest::load(&path)?;
    assert_eq!(manifest.service, "tiny");

    // a table with no handlers composes to storage only: no bindings, no
    // grants against the store, no routes
    let deployment = compose(&manifest.into_service_spec())?;
    assert!(matches!(
        deployment.resources.get("notes"),
        Some(ResourceEntry::KeyedStore { .. })
    ));
    assert!(deployment.grants.iter().all(|g| g.object != "notes"));
    assert!(deployment.routes.is_empty());
    Ok(())
}

#[test]
fn missing_manifest_surfaces_a_manifest_error() {
    let err = ServiceManifest::load(std::path::Path::new("no-such-manifest.yaml")).unwrap_err();
    assert!(matches!(err, ComposeError::Manifest(_)), "got: {err}");
}
