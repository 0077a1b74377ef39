//! VirtualMachineRestore validation policy.
//!
//! Create:
//! - Requires the Snapshot gate
//! - The target must be an existing, halted VirtualMachine
//! - The snapshot must exist, be ready, not have failed, still have its
//!   content, and have been taken from the target VM
//! - Only one unfinished restore per VM
//! - Patches must be JSON and may only touch the VM spec, labels and
//!   annotations
//!
//! Update: the spec is frozen.

use kube::ResourceExt;

use super::snapshot::validate_vm_reference;
use super::{ValidationContext, ValidationResult, immutability};
use crate::config::FeatureGate;
use crate::crd::{VirtualMachineRestore, run_strategy};
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

const TARGET_FIELD: &str = "spec.target";
const SNAPSHOT_FIELD: &str = "spec.virtualMachineSnapshotName";
const PATCHES_FIELD: &str = "spec.patches";

/// Path prefixes a restore patch may write to.
const PATCHABLE_PREFIXES: [&str; 3] = ["/spec/", "/metadata/labels/", "/metadata/annotations/"];

/// Validate a restore create.
pub fn validate_create(
    ctx: &ValidationContext<'_, VirtualMachineRestore>,
) -> Result<ValidationResult> {
    ctx.require_gate(FeatureGate::Snapshot)?;

    let restore = ctx.resource;
    let spec = &restore.spec;
    let mut causes = validate_vm_reference(&FieldPath::new(TARGET_FIELD), &spec.target);
    if spec.virtual_machine_snapshot_name.is_empty() {
        causes.push(Cause::required(
            SNAPSHOT_FIELD,
            format!("{SNAPSHOT_FIELD} is a required field"),
        ));
    }
    causes.extend(validate_patches(&spec.patches));
    if !causes.is_empty() {
        return Ok(causes.into());
    }

    let namespace = ctx.namespace();
    let vm_name = spec.target.name.as_str();
    let Some(vm) = ctx.state.get_vm(namespace, vm_name)? else {
        return Ok(vec![Cause::not_found(
            TARGET_FIELD,
            format!("VirtualMachine {vm_name:?} does not exist"),
        )]
        .into());
    };
    if vm.run_strategy() != Some(run_strategy::HALTED) {
        causes.push(Cause::invalid(
            TARGET_FIELD,
            format!(
                "VirtualMachine {vm_name:?} run strategy has to be {}",
                run_strategy::HALTED
            ),
        ));
    }

    let snapshot_name = spec.virtual_machine_snapshot_name.as_str();
    match ctx.state.get_snapshot(namespace, snapshot_name)? {
        None => causes.push(Cause::not_found(
            SNAPSHOT_FIELD,
            format!("VirtualMachineSnapshot {snapshot_name:?} does not exist"),
        )),
        Some(snapshot) if snapshot.is_failed() => causes.push(Cause::invalid(
            SNAPSHOT_FIELD,
            format!("VirtualMachineSnapshot {snapshot_name:?} has failed and is invalid to use"),
        )),
        Some(snapshot) if !snapshot.is_ready() => causes.push(Cause::invalid(
            SNAPSHOT_FIELD,
            format!("VirtualMachineSnapshot {snapshot_name:?} not ready"),
        )),
        Some(snapshot) => {
            let content = match snapshot.content_name() {
                Some(name) => ctx.state.get_snapshot_content(namespace, name)?,
                None => None,
            };
            if content.is_none() {
                causes.push(Cause::invalid(
                    SNAPSHOT_FIELD,
                    format!("VirtualMachineSnapshotContent for {snapshot_name:?} does not exist"),
                ));
            }
            let vm_uid = vm.uid();
            if snapshot.source_uid().is_some_and(|uid| Some(uid) != vm_uid.as_deref()) {
                causes.push(Cause::invalid(
                    TARGET_FIELD,
                    format!(
                        "VirtualMachineSnapshot {snapshot_name:?} was not taken from \
                         VirtualMachine {vm_name:?}"
                    ),
                ));
            }
        }
    }

    // A same-named restore that is still running counts too.
    let in_flight = ctx
        .state
        .list_restores(namespace)?
        .into_iter()
        .find(|other| other.spec.target.name == vm_name && !other.is_complete());
    if let Some(other) = in_flight {
        causes.push(Cause::invalid(
            TARGET_FIELD,
            format!(
                "VirtualMachineRestore {:?} in progress for VirtualMachine {vm_name:?}",
                other.name_any()
            ),
        ));
    }

    Ok(causes.into())
}

/// Each entry holds one JSON patch operation or a list of them. Only the
/// `path` of each operation is checked here; the restore controller applies
/// the patch.
fn validate_patches(patches: &[String]) -> Vec<Cause> {
    let mut causes = Vec::new();
    for raw in patches {
        let operations = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(operations)) => operations,
            Ok(operation @ serde_json::Value::Object(_)) => vec![operation],
            Ok(_) => {
                causes.push(Cause::invalid(
                    PATCHES_FIELD,
                    format!("patch format is not valid, expected a JSON patch operation: {raw}"),
                ));
                continue;
            }
            Err(e) => {
                causes.push(Cause::invalid(
                    PATCHES_FIELD,
                    format!("patch format is not valid: {e}: {raw}"),
                ));
                continue;
            }
        };
        for operation in &operations {
            let path = operation
                .get("path")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if !PATCHABLE_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
                causes.push(Cause::invalid(
                    PATCHES_FIELD,
                    format!("patching is valid only for elements under /spec/ only: {path:?}"),
                ));
            }
        }
    }
    causes
}

/// Validate a restore update.
pub fn validate_update(
    ctx: &ValidationContext<'_, VirtualMachineRestore>,
) -> Result<ValidationResult> {
    Ok(immutability::validate_spec_unchanged(
        &ctx.resource.spec,
        ctx.old_resource.map(|old| &old.spec),
        immutability::frozen_spec_message("VirtualMachineRestore"),
    )
    .into())
}
