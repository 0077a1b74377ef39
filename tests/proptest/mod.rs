// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for virt-admission.
//!
//! Uses proptest to generate random inputs and verify invariants of the
//! admission rules.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;
use serde_json::json;

use virt_admission::config::ClusterConfig;
use virt_admission::crd::quantity::parse_quantity;
use virt_admission::crd::{VirtualMachine, VolumeRequest};
use virt_admission::state::StaticClusterState;
use virt_admission::webhooks::ResourceKind;
use virt_admission::webhooks::policies::clone::is_valid_filter;
use virt_admission::webhooks::policies::volume_requests::{apply_volume_request, validate};

use common::fixtures::{Admission, flavor, migration, typed};

/// Strategy for profile sets: (name, default) pairs with unique names.
fn profiles() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec(any::<bool>(), 0..6).prop_map(|defaults| {
        defaults
            .into_iter()
            .enumerate()
            .map(|(i, default)| (format!("profile-{i}"), default))
            .collect()
    })
}

/// Strategy for filter strings built from plain characters and the two
/// special characters.
fn filter() -> impl Strategy<Value = String> {
    "[a-z!*/]{0,6}"
}

/// Strategy for optional migration phases.
fn phase() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("Pending")),
        Just(Some("Running")),
        Just(Some("Succeeded")),
        Just(Some("Failed")),
    ]
}

/// A halted VM whose template carries `existing` container disks and
/// whose status lists `requests`.
fn vm_with_requests(existing: &[String], requests: &[VolumeRequest]) -> VirtualMachine {
    let disks: Vec<_> = existing
        .iter()
        .map(|name| json!({"name": name, "disk": {"bus": "virtio"}}))
        .collect();
    let volumes: Vec<_> = existing
        .iter()
        .map(|name| json!({"name": name, "containerDisk": {"image": "registry/disk:latest"}}))
        .collect();
    let mut vm: VirtualMachine = typed(json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachine",
        "metadata": {"name": "vm", "namespace": "default"},
        "spec": {
            "runStrategy": "Halted",
            "template": {
                "spec": {
                    "domain": {
                        "resources": {"requests": {"memory": "128Mi"}},
                        "devices": {"disks": disks}
                    },
                    "volumes": volumes
                }
            }
        }
    }));
    vm.status = Some(typed(json!({"ready": false, "volumeRequests": requests})));
    vm
}

fn add_request(name: &str) -> VolumeRequest {
    typed(json!({
        "addVolumeOptions": {
            "name": name,
            "disk": {"name": name, "disk": {"bus": "scsi"}},
            "volumeSource": {"persistentVolumeClaim": {"claimName": name, "hotpluggable": true}}
        }
    }))
}

fn remove_request(name: &str) -> VolumeRequest {
    typed(json!({"removeVolumeOptions": {"name": name}}))
}

proptest! {
    /// Property: a profile set is allowed iff at most one profile is the default.
    #[test]
    fn test_flavor_default_count(profiles in profiles()) {
        let pairs: Vec<(&str, bool)> = profiles.iter().map(|(n, d)| (n.as_str(), *d)).collect();
        let defaults = pairs.iter().filter(|(_, d)| *d).count();

        let decision = Admission::create(ResourceKind::Flavor, flavor(&pairs)).admit();
        prop_assert_eq!(decision.allowed, defaults <= 1);
    }

    /// Property: milli quantities round up to the next whole unit, and an
    /// exponent scales like the matching decimal suffix.
    #[test]
    fn test_quantity_rounding(millis in 0_i64..10_000_000, exponent in 0_u32..12) {
        let expected = (millis + 999) / 1000;
        prop_assert_eq!(parse_quantity(&format!("{millis}m")), Some(expected));
        prop_assert_eq!(parse_quantity(&format!("-{millis}m")), Some(-expected));

        let scaled = 7 * 10_i64.pow(exponent);
        prop_assert_eq!(parse_quantity(&format!("7e{exponent}")), Some(scaled));
    }

    /// Property: a filter with a special character anywhere but the single
    /// leading '!' or trailing '*' position is rejected.
    #[test]
    fn test_filter_grammar(filter in filter()) {
        let inner = |s: &str| !s.contains(['!', '*']);
        let expected = filter == "*"
            || filter.strip_prefix('!').is_some_and(|rest| !rest.is_empty() && inner(rest))
            || (!filter.starts_with('!') && filter.strip_suffix('*').is_some_and(inner))
            || inner(&filter);
        prop_assert_eq!(is_valid_filter(&filter), expected, "{}", filter);
    }

    /// Property: a migration update is allowed iff the spec is unchanged and
    /// the selector label is unchanged or the migration is final.
    #[test]
    fn test_migration_update_immutability(
        old_vmi in "[a-c]",
        new_vmi in "[a-c]",
        new_label in "[a-c]",
        phase in phase(),
    ) {
        let old = migration("m", &old_vmi);
        let mut new = migration("m", &new_vmi);
        new["metadata"]["labels"]["kubevirt.io/vmi-name"] = json!(new_label);
        if let Some(phase) = phase {
            new["status"] = json!({"phase": phase});
        }

        let final_phase = matches!(phase, Some("Succeeded" | "Failed"));
        let expected = old_vmi == new_vmi && (final_phase || new_label == old_vmi);

        let decision = Admission::update(ResourceKind::Migration, new, old).admit();
        prop_assert_eq!(decision.allowed, expected);
    }

    /// Property: once every volume request has been applied to the
    /// template, validating the same requests again reports nothing.
    #[test]
    fn test_volume_requests_idempotent(
        existing in 1usize..4,
        removals in prop::collection::vec(any::<bool>(), 3),
        additions in 0usize..3,
    ) {
        let existing: Vec<String> = (0..existing).map(|i| format!("disk{i}")).collect();
        let mut requests: Vec<VolumeRequest> = existing
            .iter()
            .zip(&removals)
            .filter(|(_, remove)| **remove)
            .map(|(name, _)| remove_request(name))
            .collect();
        requests.extend((0..additions).map(|i| add_request(&format!("hotplug{i}"))));

        let state = StaticClusterState::new();
        let config = ClusterConfig::default();
        let vm = vm_with_requests(&existing, &requests);
        prop_assert!(validate(&vm, &state, &config).unwrap().is_empty());

        let template = &vm.spec.template.as_ref().unwrap().spec;
        let applied = requests
            .iter()
            .fold(template.clone(), |spec, request| apply_volume_request(&spec, request));
        let mut after = vm.clone();
        after.spec.template.as_mut().unwrap().spec = applied.clone();
        prop_assert!(validate(&after, &state, &config).unwrap().is_empty());

        // Applying a second time changes nothing.
        let reapplied = requests
            .iter()
            .fold(applied.clone(), |spec, request| apply_volume_request(&spec, request));
        prop_assert_eq!(reapplied, applied);
    }
}
