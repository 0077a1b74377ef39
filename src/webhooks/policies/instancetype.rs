//! Flavor, instancetype and preference validation policies.
//!
//! Namespaced and cluster-scoped variants share one validator each through
//! the [`ProfileSet`] and [`InstancetypeResources`] traits.

use super::{ValidationContext, ValidationResult};
use crate::crd::{
    CpuInstancetype, INSTANCETYPE_GROUP, InstancetypeResources, PREFERENCE_VERSIONS, ProfileSet,
};
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Validate a flavor: at most one default profile, supported CPU shapes.
pub fn validate_flavor<K: ProfileSet>(ctx: &ValidationContext<'_, K>) -> Result<ValidationResult> {
    let profiles = ctx.resource.profiles();
    let path = FieldPath::new("spec.profiles");
    let mut causes = Vec::new();

    let defaults: Vec<&str> = profiles
        .iter()
        .filter(|p| p.default)
        .map(|p| p.name.as_str())
        .collect();
    if defaults.len() > 1 {
        causes.push(Cause::not_supported(
            &path,
            format!(
                "Flavor contains more than one default profile: {}",
                defaults.join(", ")
            ),
        ));
    }

    for (idx, profile) in profiles.iter().enumerate() {
        if let Some(cpu) = profile.cpu.as_ref() {
            causes.extend(validate_cpu(&path.index(idx).child("cpu"), cpu));
        }
    }
    Ok(causes.into())
}

/// Validate an instancetype's CPU shape.
pub fn validate_instancetype<K: InstancetypeResources>(
    ctx: &ValidationContext<'_, K>,
) -> Result<ValidationResult> {
    Ok(validate_cpu(&FieldPath::new("spec.cpu"), ctx.resource.cpu()).into())
}

/// Preferences are only served under known versions.
pub fn validate_preference<K>(ctx: &ValidationContext<'_, K>) -> Result<ValidationResult> {
    let api_version = ctx
        .request
        .object
        .get("apiVersion")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let resource = &ctx.request.resource;
            format!("{}/{}", resource.group, resource.version)
        });

    let supported = api_version
        .split_once('/')
        .is_some_and(|(group, version)| {
            group == INSTANCETYPE_GROUP && PREFERENCE_VERSIONS.contains(&version)
        });
    if supported {
        return Ok(ValidationResult::allowed());
    }
    Ok(vec![Cause::not_supported(
        "apiVersion",
        format!(
            "unsupported preference version {api_version}, expected {INSTANCETYPE_GROUP}/ \
             with one of: {}",
            PREFERENCE_VERSIONS.join(", ")
        ),
    )]
    .into())
}

fn validate_cpu(path: &FieldPath, cpu: &CpuInstancetype) -> Vec<Cause> {
    let mut causes = Vec::new();
    if cpu.dedicated_cpu_placement {
        let field = path.child("dedicatedCPUPlacement");
        causes.push(Cause::not_supported(
            &field,
            format!("{field} is not currently supported"),
        ));
    }
    if cpu
        .numa
        .as_ref()
        .is_some_and(|n| n.guest_mapping_passthrough.is_some())
    {
        let field = path.child("numa").child("guestMappingPassthrough");
        causes.push(Cause::not_supported(
            &field,
            format!("{field} is not currently supported"),
        ));
    }
    causes
}
