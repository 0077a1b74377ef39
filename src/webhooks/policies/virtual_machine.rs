//! VirtualMachine validation policy.
//!
//! Create and update of the main resource:
//! - A VM being deleted is accepted as is
//! - Template required; template labels under the reserved prefix only for
//!   internal callers
//! - Instance spec rules and mandatory memory on the template
//! - Exactly one of `running` / `runStrategy`, with a known strategy
//! - Pending volume requests, and the snapshot / restore freezes
//!
//! The status subresource only runs the volume request and freeze checks.

use super::{ValidationContext, ValidationResult, instance_spec, volume_requests};
use crate::config::FeatureGate;
use crate::crd::{VirtualMachine, VirtualMachineSpec, run_strategy};
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Warning attached to allowed requests that still use `spec.running`.
pub const RUNNING_DEPRECATED_WARNING: &str =
    "spec.running is deprecated, please use spec.runStrategy instead.";

/// Validate a VirtualMachine create or update.
pub fn validate(ctx: &ValidationContext<'_, VirtualMachine>) -> Result<ValidationResult> {
    let vm = ctx.resource;
    if vm.metadata.deletion_timestamp.is_some() {
        return Ok(ValidationResult::allowed());
    }

    let causes = validate_spec(ctx);
    if !causes.is_empty() {
        return Ok(ValidationResult::denied(causes));
    }

    let causes = validate_status_rules(ctx)?;
    if !causes.is_empty() {
        return Ok(ValidationResult::denied(causes));
    }

    let mut result = ValidationResult::allowed();
    if vm.spec.running.is_some() {
        result = result.with_warning(RUNNING_DEPRECATED_WARNING);
    }
    Ok(result)
}

/// Validate an update through the status subresource.
pub fn validate_status(ctx: &ValidationContext<'_, VirtualMachine>) -> Result<ValidationResult> {
    Ok(validate_status_rules(ctx)?.into())
}

fn validate_spec(ctx: &ValidationContext<'_, VirtualMachine>) -> Vec<Cause> {
    let vm = ctx.resource;
    let field = FieldPath::new("spec");

    let Some(template) = vm.spec.template.as_ref() else {
        return vec![Cause::required(
            field.child("template"),
            "missing virtual machine template.",
        )];
    };

    let old_labels = ctx
        .old_resource
        .and_then(|old| old.spec.template.as_ref())
        .map(|t| &t.metadata.labels);

    let template_path = field.child("template");
    let spec_path = template_path.child("spec");
    let mut causes = instance_spec::validate_reserved_labels(
        &template_path.child("metadata"),
        &template.metadata.labels,
        old_labels,
        ctx.config,
        ctx.username(),
    );
    causes.extend(instance_spec::validate(&spec_path, &template.spec, ctx.config));
    causes.extend(instance_spec::validate_mandatory_fields(&spec_path, &template.spec));
    causes.extend(validate_run_strategy(&field, &vm.spec, ctx));
    causes
}

fn validate_run_strategy(
    field: &FieldPath,
    spec: &VirtualMachineSpec,
    ctx: &ValidationContext<'_, VirtualMachine>,
) -> Vec<Cause> {
    let mut causes = Vec::new();
    match (spec.running, spec.run_strategy.as_deref()) {
        (Some(_), Some(_)) => causes.push(Cause::invalid(
            field.child("running"),
            "Running and RunStrategy are mutually exclusive. Note that Running is deprecated, \
             please use RunStrategy instead",
        )),
        (None, None) => causes.push(Cause::invalid(
            field.child("running"),
            "RunStrategy must be specified",
        )),
        _ => {}
    }

    if let Some(strategy) = spec.run_strategy.as_deref() {
        let path = field.child("runStrategy");
        if strategy == run_strategy::WAIT_AS_RECEIVER {
            let gate = FeatureGate::DecentralizedLiveMigration;
            if !ctx.config.is_enabled(gate) {
                causes.push(Cause::invalid(
                    &path,
                    format!(
                        "{} feature gate is not enabled in kubevirt-config, invalid RunStrategy \
                         ({strategy})",
                        gate.name()
                    ),
                ));
            }
        } else if !run_strategy::STANDARD.contains(&strategy) {
            causes.push(Cause::invalid(&path, format!("Invalid RunStrategy ({strategy})")));
        }
    }
    causes
}

/// Checks shared by the main resource and the status subresource.
fn validate_status_rules(ctx: &ValidationContext<'_, VirtualMachine>) -> Result<Vec<Cause>> {
    let causes = volume_requests::validate(ctx.resource, ctx.state, ctx.config)?;
    if !causes.is_empty() {
        return Ok(causes);
    }
    let Some(old) = ctx.old_resource else {
        return Ok(Vec::new());
    };
    let causes = validate_snapshot_in_progress(ctx.resource, old);
    if !causes.is_empty() {
        return Ok(causes);
    }
    Ok(validate_restore_in_progress(ctx.resource, old))
}

/// While a snapshot is running, volumes and run state are frozen.
fn validate_snapshot_in_progress(vm: &VirtualMachine, old: &VirtualMachine) -> Vec<Cause> {
    let Some(snapshot) = vm.snapshot_in_progress() else {
        return Vec::new();
    };

    let volumes = |vm: &VirtualMachine| vm.spec.template.as_ref().map(|t| t.spec.volumes.clone());
    if volumes(old) != volumes(vm) {
        return vec![Cause::not_supported(
            "spec",
            format!("Cannot update VM disks or volumes until snapshot {snapshot:?} completes"),
        )];
    }
    if !running_spec_unchanged(&old.spec, &vm.spec) {
        return vec![Cause::not_supported(
            "spec",
            format!("Cannot update VM running state until snapshot {snapshot:?} completes"),
        )];
    }
    Vec::new()
}

/// While a restore is running, the run strategy is frozen.
fn validate_restore_in_progress(vm: &VirtualMachine, old: &VirtualMachine) -> Vec<Cause> {
    let Some(restore) = vm.restore_in_progress() else {
        return Vec::new();
    };
    if old.spec != vm.spec && old.run_strategy() != vm.run_strategy() {
        return vec![Cause::not_supported(
            "spec",
            format!("Cannot update VM runStrategy until restore {restore:?} completes"),
        )];
    }
    Vec::new()
}

/// Both specs express run state the same way and agree on it.
fn running_spec_unchanged(old: &VirtualMachineSpec, new: &VirtualMachineSpec) -> bool {
    match (old.running, new.running, &old.run_strategy, &new.run_strategy) {
        (Some(a), Some(b), _, _) => a == b,
        (_, _, Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use super::super::testing::run;
    use super::*;
    use crate::config::ClusterConfig;
    use crate::crd::{
        ContainerDiskSource, Disk, DiskTarget, DomainSpec, ResourceRequirements,
        VirtualMachineInstanceSpec, VirtualMachineInstanceTemplateSpec, VirtualMachineStatus,
        Volume,
    };
    use crate::state::StaticClusterState;
    use crate::webhooks::cause::CauseKind;

    const CONTROLLER: &str = "system:serviceaccount:kubevirt:kubevirt-controller";

    fn instance_spec() -> VirtualMachineInstanceSpec {
        VirtualMachineInstanceSpec {
            domain: DomainSpec {
                resources: ResourceRequirements {
                    requests: BTreeMap::from([("memory".to_string(), "128Mi".to_string())]),
                    limits: BTreeMap::new(),
                    ..Default::default()
                },
                devices: crate::crd::Devices {
                    disks: vec![Disk {
                        name: "root".to_string(),
                        disk: Some(DiskTarget {
                            bus: Some("virtio".to_string()),
                            readonly: None,
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                ..Default::default()
            },
            volumes: vec![Volume {
                name: "root".to_string(),
                container_disk: Some(ContainerDiskSource {
                    image: "fedora".to_string(),
                    path: None,
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn vm(running: Option<bool>, strategy: Option<&str>) -> VirtualMachine {
        let mut vm = VirtualMachine::new(
            "vm",
            VirtualMachineSpec {
                running,
                run_strategy: strategy.map(str::to_string),
                template: Some(VirtualMachineInstanceTemplateSpec {
                    metadata: Default::default(),
                    spec: instance_spec(),
                }),
                ..Default::default()
            },
        );
        vm.metadata.namespace = Some("default".to_string());
        vm
    }

    fn check(new: &VirtualMachine, old: Option<&VirtualMachine>) -> ValidationResult {
        run(
            validate,
            new,
            old,
            &ClusterConfig::default(),
            &StaticClusterState::new(),
            "alice",
        )
        .unwrap()
    }

    #[test]
    fn test_valid_vm() {
        let result = check(&vm(None, Some("Always")), None);
        assert!(result.is_allowed());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_running_gets_deprecation_warning() {
        let result = check(&vm(Some(true), None), None);
        assert!(result.is_allowed());
        assert_eq!(result.warnings, vec![RUNNING_DEPRECATED_WARNING.to_string()]);
    }

    #[test]
    fn test_running_and_strategy_exclusive() {
        let result = check(&vm(Some(true), Some("Always")), None);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field, "spec.running");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_strategy_required_and_known() {
        let result = check(&vm(None, None), None);
        assert_eq!(result.causes[0].message, "RunStrategy must be specified");

        let result = check(&vm(None, Some("Sometimes")), None);
        assert_eq!(result.causes[0].field, "spec.runStrategy");
        assert_eq!(result.causes[0].message, "Invalid RunStrategy (Sometimes)");
    }

    #[test]
    fn test_wait_as_receiver_gated() {
        let vm = vm(None, Some(run_strategy::WAIT_AS_RECEIVER));
        assert!(!check(&vm, None).is_allowed());

        let config = ClusterConfig::default().with_gate(FeatureGate::DecentralizedLiveMigration);
        let state = StaticClusterState::new();
        let result = run(validate, &vm, None, &config, &state, "alice").unwrap();
        assert!(result.is_allowed());
    }

    #[test]
    fn test_missing_template() {
        let mut vm = vm(None, Some("Always"));
        vm.spec.template = None;
        let result = check(&vm, None);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].kind, CauseKind::Required);
        assert_eq!(result.causes[0].field, "spec.template");
    }

    #[test]
    fn test_instance_rules_rooted_at_template() {
        let mut vm = vm(None, Some("Always"));
        if let Some(t) = vm.spec.template.as_mut() {
            t.spec.domain.devices.disks[0].serial = Some("bad serial!".to_string());
        }
        let result = check(&vm, None);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(
            result.causes[0].field,
            "spec.template.spec.domain.devices.disks[0].serial"
        );
    }

    #[test]
    fn test_reserved_template_labels() {
        let mut vm = vm(None, Some("Always"));
        if let Some(t) = vm.spec.template.as_mut() {
            t.metadata
                .labels
                .insert("kubevirt.io/created-by".to_string(), "x".to_string());
        }
        assert!(!check(&vm, None).is_allowed());

        let result = run(
            validate,
            &vm,
            None,
            &ClusterConfig::default(),
            &StaticClusterState::new(),
            CONTROLLER,
        )
        .unwrap();
        assert!(result.is_allowed());
    }

    #[test]
    fn test_deleting_vm_is_allowed() {
        let mut new = vm(None, None);
        new.spec.template = None;
        new.metadata.deletion_timestamp = Some(Time(Default::default()));
        let old = vm(None, Some("Always"));
        assert!(check(&new, Some(&old)).is_allowed());
    }

    #[test]
    fn test_snapshot_in_progress_freezes_volumes_and_run_state() {
        let old = vm(None, Some("Always"));
        let mut new = old.clone();
        new.status = Some(VirtualMachineStatus {
            snapshot_in_progress: Some("snap".to_string()),
            ..Default::default()
        });
        assert!(check(&new, Some(&old)).is_allowed());

        new.spec.run_strategy = Some("Halted".to_string());
        let result = check(&new, Some(&old));
        assert_eq!(result.causes.len(), 1);
        assert_eq!(
            result.causes[0].message,
            "Cannot update VM running state until snapshot \"snap\" completes"
        );

        let mut new = old.clone();
        new.status = Some(VirtualMachineStatus {
            snapshot_in_progress: Some("snap".to_string()),
            ..Default::default()
        });
        if let Some(t) = new.spec.template.as_mut() {
            t.spec.volumes[0].container_disk = Some(ContainerDiskSource {
                image: "centos".to_string(),
                path: None,
                ..Default::default()
            });
        }
        let result = check(&new, Some(&old));
        assert!(result.causes[0].message.starts_with("Cannot update VM disks or volumes"));
    }

    #[test]
    fn test_restore_in_progress_freezes_run_strategy() {
        let old = vm(None, Some("Halted"));
        let mut new = vm(None, Some("Always"));
        new.status = Some(VirtualMachineStatus {
            restore_in_progress: Some("restore".to_string()),
            ..Default::default()
        });
        let result = check(&new, Some(&old));
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].kind, CauseKind::NotSupported);

        // Creation is not affected.
        assert!(check(&new, None).is_allowed());
    }

    #[test]
    fn test_status_subresource_runs_freeze_checks_only() {
        let old = vm(None, Some("Always"));
        let mut new = vm(None, Some("Halted"));
        new.spec.template = None;
        new.status = Some(VirtualMachineStatus {
            snapshot_in_progress: Some("snap".to_string()),
            ..Default::default()
        });
        let result = run(
            validate_status,
            &new,
            Some(&old),
            &ClusterConfig::default(),
            &StaticClusterState::new(),
            CONTROLLER,
        )
        .unwrap();
        assert_eq!(result.causes.len(), 1);
        assert!(result.causes[0].message.contains("snapshot"));
    }
}
