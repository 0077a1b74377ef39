//! KubeVirt installation update policy.
//!
//! Moving the workload components while instances run would strand them on
//! nodes that lose their handler.

use super::{ValidationContext, ValidationResult};
use crate::crd::KubeVirt;
use crate::webhooks::cause::Cause;
use crate::webhooks::error::Result;

pub const WORKLOAD_PLACEMENT_MESSAGE: &str =
    "can't update placement of workload pods while there are running vms";

/// Validate an installation update.
pub fn validate_update(ctx: &ValidationContext<'_, KubeVirt>) -> Result<ValidationResult> {
    let Some(old) = ctx.old_resource else {
        return Ok(ValidationResult::allowed());
    };
    if ctx.resource.workload_placement() == old.workload_placement() {
        return Ok(ValidationResult::allowed());
    }

    if ctx.state.list_vmis()?.is_empty() {
        return Ok(ValidationResult::allowed());
    }
    Ok(vec![Cause::invalid(
        "spec.workloads.nodePlacement",
        WORKLOAD_PLACEMENT_MESSAGE,
    )]
    .into())
}
