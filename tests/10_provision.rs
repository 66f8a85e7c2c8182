use anyhow::Result;

use stackwright::error::ComposeError;
use stackwright::handler::HandlerRef;
use stackwright::resource::context::{Composition, ResourceEntry};
use stackwright::table::provisioner::TableProvisioner;
use stackwright::table::TableSpec;
use stackwright::types::Operation;

// Provisioning properties of the generic table core: index handling,
// validate-then-commit, duplicate rejection.

#[test]
fn provision_yields_one_index_per_declared_attribute() -> Result<()> {
    let mut cx = Composition::new("svc");
    let mut provisioner = TableProvisioner::new(&mut cx);

    let spec = TableSpec::new("records", "PK", "SK")
        .with_secondary_index("location")
        .with_secondary_index("department")
        .with_secondary_index("manager");
    let storage = provisioner.provision(&spec)?;

    assert_eq!(storage.indexes().len(), 3);

    let deployment = cx.synth();
    let Some(ResourceEntry::KeyedStore {
        primary_key,
        sort_key,
        indexes,
        ..
    }) = deployment.resources.get("records")
    else {
        panic!("expected a keyed store entry for 'records'");
    };
    assert_eq!(primary_key, "PK");
    assert_eq!(sort_key, "SK");
    assert_eq!(indexes.len(), 3);
    // each index is keyed on its declared attribute
    for attr in ["location", "department", "manager"] {
        assert_eq!(indexes.get(attr).map(String::as_str), Some(attr));
    }
    Ok(())
}

#[test]
fn index_declaration_order_does_not_change_resource_identity() -> Result<()> {
    let forward = TableSpec::new("records", "PK", "SK")
        .with_secondary_index("location")
        .with_secondary_index("department");
    let reversed = TableSpec::new("records", "PK", "SK")
        .with_secondary_index("department")
        .with_secondary_index("location");

    let mut cx_a = Composition::new("svc");
    let mut cx_b = Composition::new("svc");
    TableProvisioner::new(&mut cx_a).provision(&forward)?;
    TableProvisioner::new(&mut cx_b).provision(&reversed)?;

    assert_eq!(
        cx_a.synth().resources.get("records"),
        cx_b.synth().resources.get("records")
    );
    Ok(())
}

#[test]
fn duplicate_index_names_fail_before_any_resource_is_created() {
    let mut cx = Composition::new("svc");
    let mut provisioner = TableProvisioner::new(&mut cx);

    let spec = TableSpec::new("records", "PK", "SK")
        .with_secondary_index("location")
        .with_secondary_index("location");
    let err = provisioner.provision(&spec).unwrap_err();
    assert!(matches!(err, ComposeError::Configuration(_)), "got: {err}");

    assert!(cx.synth().resources.is_empty());
}

#[test]
fn index_colliding_with_primary_or_sort_key_is_rejected() {
    for key in ["PK", "SK"] {
        let mut cx = Composition::new("svc");
        let mut provisioner = TableProvisioner::new(&mut cx);
        let spec = TableSpec::new("records", "PK", "SK").with_secondary_index(key);
        let err = provisioner.provision(&spec).unwrap_err();
        assert!(matches!(err, ComposeError::Configuration(_)), "got: {err}");
        assert!(cx.synth().resources.is_empty());
    }
}

#[test]
fn reprovisioning_a_name_fails_and_leaves_the_first_resource_intact() -> Result<()> {
    let mut cx = Composition::new("svc");
    let mut provisioner = TableProvisioner::new(&mut cx);

    let spec = TableSpec::new("users", "PK", "SK")
        .with_handler(Operation::Create, HandlerRef::new("lambda/create-user.ts"));
    provisioner.provision(&spec)?;

    let err = provisioner.provision(&spec).unwrap_err();
    assert!(matches!(err, ComposeError::DuplicateResource(ref name) if name == "users"));

    let deployment = cx.synth();
    let Some(ResourceEntry::KeyedStore { name, .. }) = deployment.resources.get("users") else {
        panic!("first resource should be unaffected");
    };
    assert_eq!(name, "users");
    Ok(())
}
