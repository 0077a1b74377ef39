//! VirtualMachineInstance create policy.
//!
//! Instances created directly, without a VirtualMachine, get the same guest
//! hardware rules a VM template gets.

use std::collections::BTreeMap;

use super::{ValidationContext, ValidationResult, instance_spec};
use crate::crd::VirtualMachineInstance;
use crate::webhooks::cause::FieldPath;
use crate::webhooks::error::Result;

/// Validate a VirtualMachineInstance create.
pub fn validate(ctx: &ValidationContext<'_, VirtualMachineInstance>) -> Result<ValidationResult> {
    let vmi = ctx.resource;
    let spec_path = FieldPath::new("spec");

    let mut causes = instance_spec::validate(&spec_path, &vmi.spec, ctx.config);
    causes.extend(instance_spec::validate_mandatory_fields(&spec_path, &vmi.spec));

    let empty = BTreeMap::new();
    causes.extend(instance_spec::validate_reserved_labels(
        &FieldPath::new("metadata"),
        vmi.metadata.labels.as_ref().unwrap_or(&empty),
        None,
        ctx.config,
        ctx.username(),
    ));
    Ok(causes.into())
}
