//! End-to-end admission scenarios.

use serde_json::json;

use virt_admission::config::{ClusterConfig, FeatureGate};
use virt_admission::crd::{VirtualMachineInstance, VirtualMachineInstanceMigration};
use virt_admission::state::StaticClusterState;
use virt_admission::webhooks::request::NODE_NAME_CLAIM;
use virt_admission::webhooks::{CauseKind, ResourceKind, UserIdentity};

use crate::common::fixtures::{
    Admission, CONTROLLER, HANDLER, clone, flavor, migration, reference, typed, vm, vmi,
};

fn live_migration() -> ClusterConfig {
    ClusterConfig::default().with_gate(FeatureGate::LiveMigration)
}

fn snapshots() -> ClusterConfig {
    ClusterConfig::default().with_gate(FeatureGate::Snapshot)
}

// ============================================================================
// Flavors
// ============================================================================

#[test]
fn test_flavor_with_two_default_profiles() {
    let decision = Admission::create(
        ResourceKind::Flavor,
        flavor(&[("small", true), ("large", true)]),
    )
    .admit();

    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert_eq!(decision.causes[0].kind, CauseKind::NotSupported);
    assert!(
        decision.causes[0]
            .message
            .starts_with("Flavor contains more than one default profile")
    );
    assert_eq!(decision.message, decision.causes[0].message);
}

#[test]
fn test_flavor_with_one_default_profile() {
    let decision = Admission::create(
        ResourceKind::ClusterFlavor,
        json!({
            "apiVersion": "flavor.kubevirt.io/v1alpha1",
            "kind": "VirtualMachineClusterFlavor",
            "metadata": {"name": "cluster-flavor"},
            "spec": {"profiles": [{"name": "small", "default": true}, {"name": "large"}]}
        }),
    )
    .admit();
    assert!(decision.allowed);
}

// ============================================================================
// Migrations
// ============================================================================

#[test]
fn test_migration_without_vmi_name() {
    let decision = Admission::create(ResourceKind::Migration, migration("m", ""))
        .config(live_migration())
        .admit();

    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert_eq!(decision.causes[0].field, "spec.vmiName");
    assert_eq!(decision.causes[0].kind, CauseKind::Required);
}

#[test]
fn test_migration_of_non_migratable_vmi() {
    let mut instance = vmi("testvmi", "node01");
    instance["status"]["conditions"] = json!([{
        "type": "LiveMigratable",
        "status": "False",
        "reason": "DisksNotLiveMigratable",
        "message": "cannot migrate VMI with non-shared PVCs"
    }]);
    let state = StaticClusterState::new().with_vmi(typed::<VirtualMachineInstance>(instance));

    let decision = Admission::create(ResourceKind::Migration, migration("m", "testvmi"))
        .config(live_migration())
        .state(state)
        .admit();

    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert!(
        decision.causes[0]
            .message
            .contains("cannot migrate VMI with non-shared PVCs")
    );
}

#[test]
fn test_migration_conflicts_with_in_flight_migration() {
    let existing = typed::<VirtualMachineInstanceMigration>(migration("first", "testvmi"));
    let state = StaticClusterState::new()
        .with_vmi(typed(vmi("testvmi", "node01")))
        .with_migration(existing.clone());

    let decision = Admission::create(ResourceKind::Migration, migration("second", "testvmi"))
        .config(live_migration())
        .state(state.clone())
        .admit();
    assert!(!decision.allowed);
    assert!(decision.message.contains("(first)"));

    let decision = Admission::create(ResourceKind::Migration, migration("first", "testvmi"))
        .config(live_migration())
        .state(state)
        .admit();
    assert!(decision.allowed, "a migration never conflicts with itself");
}

#[test]
fn test_migration_without_gate() {
    let decision = Admission::create(ResourceKind::Migration, migration("m", "testvmi")).admit();
    assert!(decision.is_fatal());
    assert_eq!(
        decision.message,
        "LiveMigration feature gate is not enabled in kubevirt-config"
    );
}

// ============================================================================
// Instances
// ============================================================================

#[test]
fn test_max_sockets_shrink_denied_for_internal_caller() {
    let mut old = vmi("testvmi", "node01");
    old["spec"]["domain"]["cpu"] = json!({"sockets": 2, "maxSockets": 16});
    let mut new = old.clone();
    new["spec"]["domain"]["cpu"]["maxSockets"] = json!(8);

    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new, old)
        .user(UserIdentity::new(CONTROLLER))
        .admit();

    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert_eq!(decision.causes[0].field, "spec.domain.cpu.maxSockets");
}

#[test]
fn test_max_sockets_growth_allowed_for_internal_caller() {
    let mut old = vmi("testvmi", "node01");
    old["spec"]["domain"]["cpu"] = json!({"sockets": 2, "maxSockets": 8});
    let mut new = old.clone();
    new["spec"]["domain"]["cpu"]["maxSockets"] = json!(16);

    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new, old)
        .user(UserIdentity::new(CONTROLLER))
        .admit();
    assert!(decision.allowed);
}

#[test]
fn test_node_restriction_for_handler() {
    let config = ClusterConfig::default().with_gate(FeatureGate::NodeRestriction);
    let old = vmi("testvmi", "got");
    let mut new = old.clone();
    new["metadata"]["annotations"] = json!({"example.com/touched": "true"});

    let owner = UserIdentity::new(HANDLER).with_claim(NODE_NAME_CLAIM, "got");
    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new.clone(), old.clone())
        .user(owner)
        .config(config.clone())
        .admit();
    assert!(decision.allowed);

    let stranger = UserIdentity::new(HANDLER).with_claim(NODE_NAME_CLAIM, "diff");
    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new, old)
        .user(stranger)
        .config(config)
        .admit();
    assert!(!decision.allowed);
    assert_eq!(
        decision.message,
        "Node restriction, virt-handler is only allowed to modify VMIs it owns"
    );
}

#[test]
fn test_vmi_spec_frozen_for_users() {
    let old = vmi("testvmi", "node01");
    let mut new = old.clone();
    new["spec"]["domain"]["resources"]["requests"]["memory"] = json!("256Mi");

    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new, old).admit();
    assert!(!decision.allowed);
    assert_eq!(decision.message, "update of VMI object is restricted");
}

// ============================================================================
// Clones
// ============================================================================

#[test]
fn test_clone_to_same_vm_name() {
    let decision = Admission::create(
        ResourceKind::Clone,
        clone(
            reference("kubevirt.io", "VirtualMachine", "vm"),
            reference("kubevirt.io", "VirtualMachine", "vm"),
        ),
    )
    .config(snapshots())
    .admit();
    assert!(!decision.allowed);
    assert_eq!(decision.causes[0].field, "spec.target.name");
}

#[test]
fn test_clone_snapshot_to_vm_of_same_name() {
    let decision = Admission::create(
        ResourceKind::Clone,
        clone(
            reference("snapshot.kubevirt.io", "VirtualMachineSnapshot", "vm"),
            reference("kubevirt.io", "VirtualMachine", "vm"),
        ),
    )
    .config(snapshots())
    .admit();
    assert!(decision.allowed, "{}", decision.message);
}

// ============================================================================
// Virtual machines, snapshots and structure
// ============================================================================

#[test]
fn test_vm_create_allowed() {
    let decision = Admission::create(ResourceKind::VirtualMachine, vm("vm")).admit();
    assert!(decision.allowed, "{}", decision.message);
}

#[test]
fn test_vm_running_field_warns() {
    let mut machine = vm("vm");
    let spec = machine["spec"].as_object_mut().unwrap();
    spec.remove("runStrategy");
    spec.insert("running".to_string(), json!(false));

    let decision = Admission::create(ResourceKind::VirtualMachine, machine).admit();
    assert!(decision.allowed);
    assert_eq!(
        decision.warnings,
        vec!["spec.running is deprecated, please use spec.runStrategy instead.".to_string()]
    );
}

#[test]
fn test_unknown_field_denied_before_rules() {
    let mut machine = vm("vm");
    machine["spec"]["bogus"] = json!(1);

    let decision = Admission::create(ResourceKind::VirtualMachine, machine).admit();
    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert_eq!(decision.causes[0].field, "spec.bogus");
}

#[test]
fn test_snapshot_metadata_change_allowed() {
    let old = json!({
        "apiVersion": "snapshot.kubevirt.io/v1beta1",
        "kind": "VirtualMachineSnapshot",
        "metadata": {"name": "snap", "namespace": "default"},
        "spec": {"source": reference("kubevirt.io", "VirtualMachine", "vm")}
    });
    let mut finalized = old.clone();
    finalized["metadata"]["finalizers"] = json!(["snapshot.kubevirt.io/protection"]);

    let decision = Admission::update(ResourceKind::Snapshot, finalized, old.clone())
        .config(snapshots())
        .admit();
    assert!(decision.allowed);

    let mut retargeted = old.clone();
    retargeted["spec"]["source"]["name"] = json!("other");
    let decision = Admission::update(ResourceKind::Snapshot, retargeted, old)
        .config(snapshots())
        .admit();
    assert!(!decision.allowed);
}

#[test]
fn test_state_failure_is_internal_error() {
    let decision = Admission::create(ResourceKind::Migration, migration("m", "testvmi"))
        .config(live_migration())
        .state(StaticClusterState::failing("informer not synced"))
        .admit();
    assert!(decision.is_fatal());
    assert_eq!(decision.http_status(), 500);
    assert!(!decision.message.contains("informer"));
}
