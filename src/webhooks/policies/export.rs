//! VirtualMachineExport validation policy.

use super::{ValidationContext, ValidationResult, immutability};
use crate::config::FeatureGate;
use crate::crd::{EXPORT_SOURCES, VirtualMachineExport};
use crate::webhooks::cause::Cause;
use crate::webhooks::error::Result;

/// Validate an export create: a supported source kind in its own group,
/// with a name.
pub fn validate_create(
    ctx: &ValidationContext<'_, VirtualMachineExport>,
) -> Result<ValidationResult> {
    ctx.require_gate(FeatureGate::VmExport)?;

    let source = &ctx.resource.spec.source;
    let mut causes = Vec::new();

    match EXPORT_SOURCES.iter().find(|(_, kind)| *kind == source.kind) {
        None => causes.push(Cause::not_supported(
            "spec.source.kind",
            format!(
                "spec.source.kind has invalid value {:?}, must be one of: {}",
                source.kind,
                EXPORT_SOURCES.map(|(_, kind)| kind).join(", ")
            ),
        )),
        Some((group, kind)) if source.api_group() != *group => causes.push(Cause::not_supported(
            "spec.source.apiGroup",
            format!(
                "spec.source.apiGroup has invalid value {:?} for kind {kind}",
                source.api_group()
            ),
        )),
        Some(_) => {}
    }

    if source.name.is_empty() {
        causes.push(Cause::required("spec.source.name", "spec.source.name is a required field"));
    }

    Ok(causes.into())
}

/// Validate an export update.
pub fn validate_update(
    ctx: &ValidationContext<'_, VirtualMachineExport>,
) -> Result<ValidationResult> {
    Ok(immutability::validate_spec_unchanged(
        &ctx.resource.spec,
        ctx.old_resource.map(|old| &old.spec),
        immutability::frozen_spec_message("VirtualMachineExport"),
    )
    .into())
}
