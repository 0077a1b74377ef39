//! Pending hotplug volume requests on a VirtualMachine.
//!
//! Requests are checked one by one, then applied to a copy of the template
//! spec (and of the live instance spec, when one is running) and the result
//! is put through the full instance spec rules. Nothing is applied unless
//! every request is acceptable.

use std::collections::HashSet;

use kube::ResourceExt;

use super::instance_spec;
use crate::config::ClusterConfig;
use crate::crd::{
    Disk, DiskKind, VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceSpec, Volume,
    VolumeRequest,
};
use crate::state::ClusterState;
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Field reported for request-level causes.
pub const VOLUME_REQUESTS_FIELD: &str = "status.volumeRequests";

/// Buses a hotplugged LUN may not use.
const LUN_FORBIDDEN_BUSES: [&str; 2] = ["virtio", "usb"];

/// Validate `vm.status.volumeRequests` against the template and the live
/// instance.
pub fn validate(
    vm: &VirtualMachine,
    state: &dyn ClusterState,
    config: &ClusterConfig,
) -> Result<Vec<Cause>> {
    let requests = vm.volume_requests();
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let live_vmi = live_instance(vm, state)?;
    let template_spec = vm
        .spec
        .template
        .as_ref()
        .map(|t| t.spec.clone())
        .unwrap_or_default();

    let template_volumes = &template_spec.volumes;
    let live_volumes = live_vmi.as_ref().map(|vmi| vmi.spec.volumes.as_slice());

    let mut added = HashSet::new();
    let mut removed = HashSet::new();
    let mut simulated = template_spec.clone();
    let mut simulated_live = live_vmi.as_ref().map(|vmi| vmi.spec.clone());

    for request in requests {
        match (&request.add_volume_options, &request.remove_volume_options) {
            (Some(_), Some(_)) => {
                return Ok(vec![request_cause(
                    "VolumeRequests require either addVolumeOptions or removeVolumeOptions to \
                     be set, not both",
                )]);
            }
            (None, None) => {
                return Ok(vec![request_cause(
                    "VolumeRequests require one of either addVolumeOptions or \
                     removeVolumeOptions to be set",
                )]);
            }
            (Some(add), None) => {
                let name = add.name.as_str();
                if !added.insert(name) {
                    return Ok(vec![request_cause(format!(
                        "AddVolume request for [{name}] aleady exists"
                    ))]);
                }
                if removed.contains(name) {
                    return Ok(vec![request_cause(format!(
                        "AddVolume request for [{name}] conflicts with a RemoveVolume request \
                         for the same volume"
                    ))]);
                }
                if let Some(cause) = validate_hotplug_disk(add.disk.as_ref(), name) {
                    return Ok(vec![cause]);
                }

                let volume = add.to_volume();
                if conflicts(template_volumes, &volume) {
                    return Ok(vec![request_cause(format!(
                        "AddVolume request for [{name}] conflicts with an existing volume of \
                         the same name on the vmi template."
                    ))]);
                }
                if live_volumes.is_some_and(|volumes| conflicts(volumes, &volume)) {
                    return Ok(vec![request_cause(format!(
                        "AddVolume request for [{name}] conflicts with an existing volume of \
                         the same name on currently running vmi"
                    ))]);
                }
            }
            (None, Some(remove)) => {
                let name = remove.name.as_str();
                if !removed.insert(name) {
                    return Ok(vec![request_cause(format!(
                        "RemoveVolume request for [{name}] aleady exists"
                    ))]);
                }
                if added.contains(name) {
                    return Ok(vec![request_cause(format!(
                        "RemoveVolume request for [{name}] conflicts with an AddVolume request \
                         for the same volume"
                    ))]);
                }
            }
        }

        simulated = apply_volume_request(&simulated, request);
        simulated_live = simulated_live.map(|spec| apply_volume_request(&spec, request));
    }

    let field = FieldPath::new("spec.template.spec");
    let causes = instance_spec::validate(&field, &simulated, config);
    if !causes.is_empty() {
        return Ok(causes);
    }

    if let (Some(vmi), Some(spec)) = (live_vmi.as_ref(), simulated_live.as_ref()) {
        let causes = instance_spec::validate(&field, spec, config);
        if !causes.is_empty() {
            return Ok(causes);
        }
        if vmi.is_migrating() {
            return Ok(vec![Cause::not_supported(
                "spec",
                "Cannot handle volume requests while VMI migration is in progress",
            )]);
        }
    }

    Ok(Vec::new())
}

/// Apply one request to `spec`, returning the resulting spec.
///
/// Adding a volume that is already present, or removing one that is
/// absent, leaves the spec unchanged.
pub fn apply_volume_request(
    spec: &VirtualMachineInstanceSpec,
    request: &VolumeRequest,
) -> VirtualMachineInstanceSpec {
    let mut next = spec.clone();
    if let Some(add) = request.add_volume_options.as_ref() {
        if !next.volumes.iter().any(|v| v.name == add.name) {
            next.volumes.push(add.to_volume());
        }
        let disks = &mut next.domain.devices.disks;
        if !disks.iter().any(|d| d.name == add.name) {
            if let Some(disk) = add.disk.as_ref() {
                let mut disk = disk.clone();
                disk.name = add.name.clone();
                disks.push(disk);
            }
        }
    } else if let Some(remove) = request.remove_volume_options.as_ref() {
        next.volumes.retain(|v| v.name != remove.name);
        next.domain.devices.disks.retain(|d| d.name != remove.name);
    }
    next
}

/// The running instance of `vm`, when it is ready and not being deleted.
fn live_instance(
    vm: &VirtualMachine,
    state: &dyn ClusterState,
) -> Result<Option<VirtualMachineInstance>> {
    if !vm.is_ready() {
        return Ok(None);
    }
    let namespace = vm.namespace().unwrap_or_default();
    let vmi = state.get_vmi(&namespace, &vm.name_any())?;
    Ok(vmi.filter(|vmi| !vmi.is_terminating()))
}

fn conflicts(existing: &[Volume], volume: &Volume) -> bool {
    existing
        .iter()
        .any(|v| v.name == volume.name && v != volume)
}

fn request_cause(message: impl Into<String>) -> Cause {
    Cause::invalid(VOLUME_REQUESTS_FIELD, message)
}

/// Device and bus compatibility for a hotplugged disk.
fn validate_hotplug_disk(disk: Option<&Disk>, name: &str) -> Option<Cause> {
    let Some(disk) = disk else {
        return Some(request_cause(format!(
            "AddVolume request for [{name}] requires the disk field to be set."
        )));
    };

    let (kind, bus) = disk.device();
    let bus = bus.unwrap_or_default();
    match kind {
        DiskKind::Cdrom => {
            return Some(request_cause(format!(
                "AddVolume request for [{name}] requires diskDevice of type 'disk' or 'lun' \
                 to be used."
            )));
        }
        DiskKind::Lun if LUN_FORBIDDEN_BUSES.contains(&bus) => {
            return Some(request_cause(format!(
                "AddVolume request for [{name}] does not permit bus [{bus}] on a lun device"
            )));
        }
        DiskKind::Disk | DiskKind::Lun => {}
    }

    if disk.dedicated_io_thread == Some(true) && bus != "virtio" {
        return Some(request_cause(format!(
            "AddVolume request for [{name}] requires bus 'virtio' when dedicatedIOThread is set"
        )));
    }
    None
}
