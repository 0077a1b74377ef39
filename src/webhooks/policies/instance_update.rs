//! VirtualMachineInstance update policy.
//!
//! Instances are created and driven by the controllers, so updates are
//! narrow:
//! - The per-node handler may only touch instances its node owns
//! - Only internal service accounts may change the spec, and even they may
//!   not shrink the CPU hotplug ceiling
//! - Reserved labels may only be changed by internal service accounts

use super::{ValidationContext, ValidationResult, instance_spec, node_restriction};
use crate::crd::VirtualMachineInstance;
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Validate a VirtualMachineInstance update.
pub fn validate(ctx: &ValidationContext<'_, VirtualMachineInstance>) -> Result<ValidationResult> {
    let Some(old) = ctx.old_resource else {
        return Ok(ValidationResult::allowed());
    };
    let new = ctx.resource;

    let causes = node_restriction::validate(old, &ctx.request.user, ctx.config);
    if !causes.is_empty() {
        return Ok(causes.into());
    }

    let mut causes = Vec::new();
    if new.spec != old.spec {
        if ctx.is_internal_user() {
            causes.extend(validate_max_sockets(new, old));
        } else {
            causes.push(Cause::not_supported(
                "spec",
                "update of VMI object is restricted",
            ));
        }
    }

    let empty = Default::default();
    causes.extend(instance_spec::validate_reserved_labels(
        &FieldPath::new("metadata"),
        new.metadata.labels.as_ref().unwrap_or(&empty),
        Some(old.metadata.labels.as_ref().unwrap_or(&empty)),
        ctx.config,
        ctx.username(),
    ));
    Ok(causes.into())
}

/// `domain.cpu.maxSockets` may grow or stay, never shrink.
fn validate_max_sockets(new: &VirtualMachineInstance, old: &VirtualMachineInstance) -> Vec<Cause> {
    let max_sockets =
        |vmi: &VirtualMachineInstance| vmi.spec.domain.cpu.as_ref().map_or(0, |c| c.max_sockets);
    let (before, after) = (max_sockets(old), max_sockets(new));
    if before != 0 && after < before {
        let field = FieldPath::new("spec.domain.cpu.maxSockets");
        return vec![Cause::invalid(
            &field,
            format!("{field} cannot be decreased from {before} to {after}"),
        )];
    }
    Vec::new()
}
