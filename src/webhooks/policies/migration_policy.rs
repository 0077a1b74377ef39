//! MigrationPolicy validation policy.
//!
//! Bandwidth and completion timeout must not be negative.

use super::{ValidationContext, ValidationResult};
use crate::crd::MigrationPolicy;
use crate::crd::quantity::parse_quantity;
use crate::webhooks::cause::Cause;
use crate::webhooks::error::Result;

/// Validate a migration policy on create and update.
pub fn validate(ctx: &ValidationContext<'_, MigrationPolicy>) -> Result<ValidationResult> {
    let spec = &ctx.resource.spec;
    let mut causes = Vec::new();

    if let Some(raw) = spec.bandwidth_per_migration.as_deref() {
        let field = "spec.bandwidthPerMigration";
        match parse_quantity(raw) {
            None => causes.push(Cause::invalid(
                field,
                format!("{field} '{raw}' is not a valid quantity"),
            )),
            Some(value) if value < 0 => causes.push(Cause::invalid(
                field,
                format!("{field} must not be negative"),
            )),
            Some(_) => {}
        }
    }

    if spec.completion_timeout_per_gib.is_some_and(|t| t < 0) {
        let field = "spec.completionTimeoutPerGiB";
        causes.push(Cause::invalid(field, format!("{field} must not be negative")));
    }

    Ok(causes.into())
}
