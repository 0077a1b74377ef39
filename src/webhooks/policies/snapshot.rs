//! VirtualMachineSnapshot validation policy.
//!
//! Create: the Snapshot gate must be on and the source must name an
//! existing VirtualMachine. Update: the spec is frozen.

use super::{ValidationContext, ValidationResult, immutability};
use crate::config::FeatureGate;
use crate::crd::{CORE_GROUP, TypedObjectReference, VirtualMachineSnapshot};
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Validate a snapshot create.
pub fn validate_create(
    ctx: &ValidationContext<'_, VirtualMachineSnapshot>,
) -> Result<ValidationResult> {
    ctx.require_gate(FeatureGate::Snapshot)?;

    let source = &ctx.resource.spec.source;
    let causes = validate_vm_reference(&FieldPath::new("spec.source"), source);
    if !causes.is_empty() {
        return Ok(causes.into());
    }

    if ctx.state.get_vm(ctx.namespace(), &source.name)?.is_none() {
        return Ok(vec![Cause::not_found(
            "spec.source.name",
            format!("VirtualMachine {:?} does not exist", source.name),
        )]
        .into());
    }
    Ok(ValidationResult::allowed())
}

/// Validate a snapshot update.
pub fn validate_update(
    ctx: &ValidationContext<'_, VirtualMachineSnapshot>,
) -> Result<ValidationResult> {
    Ok(immutability::validate_spec_unchanged(
        &ctx.resource.spec,
        ctx.old_resource.map(|old| &old.spec),
        immutability::frozen_spec_message("VirtualMachineSnapshot"),
    )
    .into())
}

/// A reference must be a named `kubevirt.io` VirtualMachine.
pub(crate) fn validate_vm_reference(
    path: &FieldPath,
    reference: &TypedObjectReference,
) -> Vec<Cause> {
    let mut causes = Vec::new();
    let group = path.child("apiGroup");
    match reference.api_group.as_deref() {
        None | Some("") => {
            causes.push(Cause::required(&group, format!("{group} is a required field")))
        }
        Some(CORE_GROUP) => {}
        Some(other) => causes.push(Cause::not_supported(
            &group,
            format!("{group} has invalid value {other}, must be {CORE_GROUP}"),
        )),
    }

    let kind = path.child("kind");
    if reference.kind != "VirtualMachine" {
        causes.push(Cause::not_supported(
            &kind,
            format!("{kind} has invalid value {:?}, must be VirtualMachine", reference.kind),
        ));
    }

    if reference.name.is_empty() {
        let name = path.child("name");
        causes.push(Cause::required(&name, format!("{name} is a required field")));
    }
    causes
}
