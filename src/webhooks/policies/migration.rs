//! VirtualMachineInstanceMigration validation policy.
//!
//! Create:
//! - Requires the LiveMigration gate
//! - The target instance must exist, be alive and report itself migratable
//! - No other migration of the same instance may be in flight
//!
//! Update:
//! - The spec is frozen
//! - The selector label is frozen until the migration finishes
//!
//! The in-flight check reads cached state, so two creates racing for the
//! same instance can both pass. The store's optimistic concurrency and the
//! migration controller settle that case.

use std::collections::BTreeMap;

use kube::ResourceExt;

use super::{ValidationContext, ValidationResult, immutability};
use crate::config::FeatureGate;
use crate::crd::{MIGRATION_SELECTOR_LABEL, VirtualMachineInstanceMigration};
use crate::webhooks::cause::Cause;
use crate::webhooks::error::Result;

const VMI_NAME_FIELD: &str = "spec.vmiName";

/// Validate a migration create.
pub fn validate_create(
    ctx: &ValidationContext<'_, VirtualMachineInstanceMigration>,
) -> Result<ValidationResult> {
    ctx.require_gate(FeatureGate::LiveMigration)?;

    let migration = ctx.resource;
    let vmi_name = migration.spec.vmi_name.as_str();
    if vmi_name.is_empty() {
        return Ok(vec![Cause::required(
            VMI_NAME_FIELD,
            format!("{VMI_NAME_FIELD} is a required field"),
        )]
        .into());
    }

    let Some(vmi) = ctx.state.get_vmi(ctx.namespace(), vmi_name)? else {
        return Ok(vec![Cause::not_found(
            VMI_NAME_FIELD,
            format!("VirtualMachineInstance '{vmi_name}' not found."),
        )]
        .into());
    };

    if vmi.is_final() {
        return Ok(vec![Cause::invalid(
            VMI_NAME_FIELD,
            "Cannot migrate VMI in finalized state.",
        )]
        .into());
    }

    if let Some(condition) = vmi.migratable_condition().filter(|c| c.status == "False") {
        return Ok(vec![Cause::invalid(
            VMI_NAME_FIELD,
            format!(
                "Cannot migrate VMI, Reason: {}, Message: {}",
                condition.reason.as_deref().unwrap_or_default(),
                condition.message.as_deref().unwrap_or_default()
            ),
        )]
        .into());
    }

    let selector = BTreeMap::from([(MIGRATION_SELECTOR_LABEL.to_string(), vmi_name.to_string())]);
    let own_name = migration.name_any();
    let in_flight = ctx
        .state
        .list_migrations(ctx.namespace(), &selector)?
        .into_iter()
        .find(|other| !other.is_final() && other.name_any() != own_name);
    if let Some(other) = in_flight {
        return Ok(vec![Cause::invalid(
            VMI_NAME_FIELD,
            format!(
                "in-flight migration detected. Active migration job ({}) is currently already \
                 in progress for VMI {vmi_name}.",
                other.name_any()
            ),
        )]
        .into());
    }

    if let Some(state) = vmi
        .migration_state()
        .filter(|m| m.migration_uid.is_some() && !m.completed && !m.failed)
    {
        return Ok(vec![Cause::invalid(
            VMI_NAME_FIELD,
            format!(
                "in-flight migration detected. Active migration job ({}) is currently already \
                 in progress for VMI {vmi_name}.",
                state.migration_uid.as_deref().unwrap_or_default()
            ),
        )]
        .into());
    }

    Ok(ValidationResult::allowed())
}

/// Validate a migration update.
pub fn validate_update(
    ctx: &ValidationContext<'_, VirtualMachineInstanceMigration>,
) -> Result<ValidationResult> {
    let Some(old) = ctx.old_resource else {
        return Ok(ValidationResult::allowed());
    };
    let new = ctx.resource;

    let causes = immutability::validate_spec_unchanged(
        &new.spec,
        Some(&old.spec),
        "update of Migration object's spec is restricted",
    );
    if !causes.is_empty() {
        return Ok(causes.into());
    }

    let selector = |m: &VirtualMachineInstanceMigration| {
        m.labels().get(MIGRATION_SELECTOR_LABEL).cloned()
    };
    if !new.is_final() && selector(new) != selector(old) {
        return Ok(vec![Cause::not_supported(
            format!("metadata.labels[{MIGRATION_SELECTOR_LABEL}]"),
            "selector label can't be modified on an active migration",
        )]
        .into());
    }

    Ok(ValidationResult::allowed())
}
