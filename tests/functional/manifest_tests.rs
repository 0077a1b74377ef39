//! Admission of manifests as users write them and as the cluster stores them.
//!
//! The YAML under `tests/fixtures` carries the fields other components own
//! (status, template metadata, data volume templates, install options) next
//! to the fields the rules inspect.

use serde_json::{Value, json};

use virt_admission::config::{ClusterConfig, FeatureGate};
use virt_admission::state::StaticClusterState;
use virt_admission::webhooks::request::NODE_NAME_CLAIM;
use virt_admission::webhooks::{CauseKind, ResourceKind, UserIdentity};

use crate::common::fixtures::{Admission, CONTROLLER, HANDLER, manifest, migration, typed, vmi};

/// Copy every field of `patch` over `base`, recursing into objects.
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

fn running_cirros() -> Value {
    let mut object = manifest("vmi-cirros.yaml");
    merge(&mut object, manifest("vmi-cirros-status.yaml"));
    object
}

// ============================================================================
// VirtualMachine
// ============================================================================

#[test]
fn test_vm_manifest_admitted() {
    let decision = Admission::create(ResourceKind::VirtualMachine, manifest("vm-fedora.yaml"))
        .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
    assert!(decision.warnings.is_empty());
}

#[test]
fn test_vm_manifest_update_of_stored_object() {
    let old = manifest("vm-fedora.yaml");
    let mut new = old.clone();
    new["spec"]["runStrategy"] = json!("Halted");
    new["status"]["printableStatus"] = json!("Stopping");

    let decision = Admission::update(ResourceKind::VirtualMachine, new, old).admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

#[test]
fn test_vm_manifest_with_broken_network_wiring() {
    let mut object = manifest("vm-fedora.yaml");
    object["spec"]["template"]["spec"]["networks"][1]["name"] = json!("backup");

    let decision = Admission::create(ResourceKind::VirtualMachine, object).admit();
    assert!(!decision.allowed);
    let fields: Vec<&str> = decision.causes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "spec.template.spec.domain.devices.interfaces[1].name",
            "spec.template.spec.networks[1].name",
        ]
    );
}

#[test]
fn test_vm_manifest_with_misspelled_field() {
    let mut object = manifest("vm-fedora.yaml");
    object["spec"]["template"]["spec"]["networks"][0]["podd"] = json!({});

    let decision = Admission::create(ResourceKind::VirtualMachine, object).admit();
    assert!(!decision.allowed);
    assert_eq!(decision.causes.len(), 1);
    assert_eq!(decision.causes[0].field, "spec.template.spec.networks[0].podd");
}

// ============================================================================
// VirtualMachineInstance
// ============================================================================

#[test]
fn test_vmi_manifest_admitted() {
    let decision = Admission::create(
        ResourceKind::VirtualMachineInstance,
        manifest("vmi-cirros.yaml"),
    )
    .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

#[test]
fn test_vmi_status_report_from_owning_handler() {
    let old = manifest("vmi-cirros.yaml");
    let mut old_running = old.clone();
    merge(
        &mut old_running,
        json!({"status": {"phase": "Scheduled", "nodeName": "node01"}}),
    );
    let config = ClusterConfig::default().with_gate(FeatureGate::NodeRestriction);
    let owner = UserIdentity::new(HANDLER).with_claim(NODE_NAME_CLAIM, "node01");

    let decision = Admission::update(
        ResourceKind::VirtualMachineInstance,
        running_cirros(),
        old_running,
    )
    .user(owner)
    .config(config)
    .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

#[test]
fn test_vmi_manifest_spec_frozen_for_users() {
    let old = running_cirros();
    let mut new = old.clone();
    new["spec"]["domain"]["devices"]["interfaces"][0]["model"] = json!("e1000");

    let decision =
        Admission::update(ResourceKind::VirtualMachineInstance, new.clone(), old.clone()).admit();
    assert!(!decision.allowed);
    assert_eq!(decision.causes[0].kind, CauseKind::NotSupported);
    assert_eq!(decision.message, "update of VMI object is restricted");

    let decision = Admission::update(ResourceKind::VirtualMachineInstance, new, old)
        .user(UserIdentity::new(CONTROLLER))
        .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

// ============================================================================
// KubeVirt
// ============================================================================

#[test]
fn test_kubevirt_manifest_admitted() {
    let decision = Admission::create(ResourceKind::KubeVirt, manifest("kubevirt.yaml")).admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

#[test]
fn test_kubevirt_manifest_gate_change_with_running_vms() {
    let old = manifest("kubevirt.yaml");
    let mut new = old.clone();
    new["spec"]["configuration"]["developerConfiguration"]["featureGates"] =
        json!(["LiveMigration", "Snapshot", "HotplugVolumes"]);
    let state = StaticClusterState::new().with_vmi(typed(vmi("testvmi", "node01")));

    let decision = Admission::update(ResourceKind::KubeVirt, new, old)
        .state(state)
        .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}

#[test]
fn test_kubevirt_manifest_workload_move_with_running_vms() {
    let old = manifest("kubevirt.yaml");
    let mut new = old.clone();
    new["spec"]["workloads"]["nodePlacement"]["nodeSelector"] = json!({"zone": "b"});
    let state = StaticClusterState::new().with_vmi(typed(vmi("testvmi", "node01")));

    let decision = Admission::update(ResourceKind::KubeVirt, new, old)
        .state(state)
        .admit();
    assert!(!decision.allowed);
    assert_eq!(decision.causes[0].field, "spec.workloads.nodePlacement");
}

// ============================================================================
// Migration
// ============================================================================

#[test]
fn test_migration_update_while_waiting_for_sync() {
    let mut old = migration("decentralized", "testvmi");
    merge(
        &mut old,
        json!({
            "spec": {"receive": {"migrationID": "mig-1"}},
            "status": {"phase": "Pending"}
        }),
    );
    let mut new = old.clone();
    new["status"]["phase"] = json!("WaitingForSync");
    new["status"]["synchronizationAddresses"] = json!(["10.244.0.40:9185"]);

    let decision = Admission::update(ResourceKind::Migration, new.clone(), old)
        .user(UserIdentity::new(CONTROLLER))
        .admit();
    assert!(decision.allowed, "{:?}", decision.causes);

    let mut synchronizing = new.clone();
    synchronizing["status"]["phase"] = json!("Synchronizing");
    let decision = Admission::update(ResourceKind::Migration, synchronizing, new)
        .user(UserIdentity::new(CONTROLLER))
        .admit();
    assert!(decision.allowed, "{:?}", decision.causes);
}
