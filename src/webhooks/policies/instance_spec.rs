//! Guest hardware rules for an instance spec.
//!
//! Shared by VirtualMachine templates (rooted at `spec.template.spec`),
//! VirtualMachineInstances (rooted at `spec`) and the hotplug simulation,
//! which re-runs these rules on a spec with pending volume requests applied.
//!
//! Validates:
//! - List size limits and name uniqueness for disks and volumes
//! - Memory requests, limits, hugepages and hotplug alignment
//! - CPU hotplug bounds and NUMA placement
//! - Disk targets, buses, boot order, serial and cache mode
//! - Volume sources, cloud-init payloads and gated sources
//! - Interfaces and networks, via [`network`](super::network)
//! - Gated features: architecture and SEV

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use super::network;
use crate::config::{ClusterConfig, FeatureGate};
use crate::crd::quantity::{format_binary, parse_quantity};
use crate::crd::{
    CloudInitSource, Disk, DiskKind, RESERVED_LABELS, VirtualMachineInstanceSpec, Volume,
};
use crate::webhooks::cause::{Cause, FieldPath};

/// Maximum number of disks, volumes, interfaces or networks.
pub const ARRAY_LEN_MAX: usize = 256;
/// Maximum length of a disk serial.
pub const MAX_SERIAL_LEN: usize = 256;
/// Smallest non-zero memory request.
const MIN_MEMORY_REQUEST: i64 = 1_000_000;

const VALID_BUSES: [&str; 4] = ["virtio", "sata", "scsi", "usb"];
const VALID_CACHE_MODES: [&str; 3] = ["none", "writethrough", "writeback"];
const HOST_DISK_TYPES: [&str; 2] = ["Disk", "DiskOrCreate"];

static SERIAL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.+-]+$").ok());

fn is_valid_serial(serial: &str) -> bool {
    SERIAL_RE.as_ref().is_some_and(|re| re.is_match(serial))
}

/// Run every instance spec rule, rooted at `field`.
pub fn validate(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
    config: &ClusterConfig,
) -> Vec<Cause> {
    let disks = &spec.domain.devices.disks;
    if disks.len() > ARRAY_LEN_MAX {
        let path = field.child("domain").child("devices").child("disks");
        return vec![list_too_long(&path)];
    }
    if spec.volumes.len() > ARRAY_LEN_MAX {
        return vec![list_too_long(&field.child("volumes"))];
    }

    let mut causes = Vec::new();
    causes.extend(validate_memory(field, spec));
    causes.extend(validate_memory_hotplug(field, spec, config));
    causes.extend(validate_cpu(field, spec));
    causes.extend(validate_architecture(field, spec, config));
    causes.extend(validate_disk_volume_mapping(field, spec));
    match network::validate(field, spec, config) {
        ControlFlow::Continue(found) => causes.extend(found),
        ControlFlow::Break(found) => {
            causes.extend(found);
            return causes;
        }
    }
    causes.extend(validate_disks(
        &field.child("domain").child("devices").child("disks"),
        disks,
    ));
    causes.extend(validate_volumes(&field.child("volumes"), &spec.volumes, config));
    causes.extend(validate_volume_disks(field, spec));
    causes.extend(validate_launch_security(field, spec, config));
    causes
}

/// Memory must be requested in at least one way.
pub fn validate_mandatory_fields(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
) -> Vec<Cause> {
    let requested = spec
        .domain
        .resources
        .requests
        .get("memory")
        .and_then(|q| parse_quantity(q))
        .unwrap_or(0);
    let memory = spec.domain.memory.as_ref();
    let has_guest = memory.is_some_and(|m| m.guest.is_some() || m.hugepages.is_some());
    if requested == 0 && !has_guest {
        let domain = field.child("domain");
        return vec![Cause::required(
            field,
            format!(
                "no memory requested, at least one of '{}', '{}' or '{}' must be set",
                domain.child("memory").child("guest"),
                domain.child("memory").child("hugepages").child("size"),
                domain.child("resources").child("requests").child("memory"),
            ),
        )];
    }
    Vec::new()
}

/// Labels under the reserved prefix may only be set by internal callers.
pub fn validate_reserved_labels(
    field: &FieldPath,
    labels: &BTreeMap<String, String>,
    old_labels: Option<&BTreeMap<String, String>>,
    config: &ClusterConfig,
    username: &str,
) -> Vec<Cause> {
    if config.is_internal_user(username) {
        return Vec::new();
    }
    let reserved = |labels: &BTreeMap<String, String>| -> BTreeMap<String, String> {
        labels
            .iter()
            .filter(|(k, _)| RESERVED_LABELS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    let new_reserved = reserved(labels);
    let changed = match old_labels {
        Some(old) => reserved(old) != new_reserved,
        None => !new_reserved.is_empty(),
    };
    if changed {
        let names: Vec<&str> = new_reserved.keys().map(String::as_str).collect();
        let message = if old_labels.is_some() {
            "modification of the following reserved kubevirt.io/ labels is prohibited"
        } else {
            "creation of the following reserved kubevirt.io/ labels is prohibited"
        };
        return vec![Cause::not_supported(
            field.child("labels"),
            if names.is_empty() {
                message.to_string()
            } else {
                format!("{message}: {}", names.join(", "))
            },
        )];
    }
    Vec::new()
}

fn list_too_long(path: &FieldPath) -> Cause {
    Cause::too_long(
        path,
        format!("{path} list exceeds the {ARRAY_LEN_MAX} element limit in length"),
    )
}

/// Parse a quantity for `path`, recording a cause when malformed.
/// Absent and malformed values read as zero.
fn quantity_value(path: &FieldPath, value: Option<&String>, causes: &mut Vec<Cause>) -> i64 {
    match value {
        None => 0,
        Some(raw) => match parse_quantity(raw) {
            Some(v) => v,
            None => {
                causes.push(Cause::invalid(
                    path,
                    format!("{path} '{raw}': quantities must match the regular expression"),
                ));
                0
            }
        },
    }
}

fn validate_memory(field: &FieldPath, spec: &VirtualMachineInstanceSpec) -> Vec<Cause> {
    let mut causes = Vec::new();
    let resources = field.child("domain").child("resources");
    let request_path = resources.child("requests").child("memory");
    let limit_path = resources.child("limits").child("memory");
    let raw_request = spec.domain.resources.requests.get("memory");
    let raw_limit = spec.domain.resources.limits.get("memory");

    let request = quantity_value(&request_path, raw_request, &mut causes);
    let limit = quantity_value(&limit_path, raw_limit, &mut causes);
    let shown = |raw: Option<&String>| raw.cloned().unwrap_or_else(|| "0".to_string());

    if request < 0 {
        causes.push(Cause::invalid(
            &request_path,
            format!(
                "{request_path} '{}': must be greater than or equal to 0.",
                shown(raw_request)
            ),
        ));
    } else if request > 0 && request < MIN_MEMORY_REQUEST {
        causes.push(Cause::invalid(
            &request_path,
            format!(
                "{request_path} '{}': must be greater than or equal to 1M.",
                shown(raw_request)
            ),
        ));
    }

    if limit < 0 {
        causes.push(Cause::invalid(
            &limit_path,
            format!(
                "{limit_path} '{}': must be greater than or equal to 0.",
                shown(raw_limit)
            ),
        ));
    }
    if limit > 0 && request > limit {
        causes.push(Cause::invalid(
            &request_path,
            format!(
                "{request_path} '{}' is greater than {limit_path} '{}'",
                shown(raw_request),
                shown(raw_limit)
            ),
        ));
    }

    let Some(memory) = spec.domain.memory.as_ref() else {
        return causes;
    };

    if let Some(hugepages) = memory.hugepages.as_ref() {
        let size_path = field.child("domain").child("hugepages").child("size");
        match parse_quantity(&hugepages.page_size) {
            None => causes.push(Cause::invalid(
                &size_path,
                format!(
                    "{size_path} '{}': quantities must match the regular expression",
                    hugepages.page_size
                ),
            )),
            Some(page) if request < page => causes.push(Cause::invalid(
                &request_path,
                format!(
                    "{request_path} '{}' must be equal to or larger than page size \
                     {size_path} '{}'",
                    shown(raw_request),
                    hugepages.page_size
                ),
            )),
            Some(page) if page > 0 && request % page != 0 => causes.push(Cause::invalid(
                &request_path,
                format!(
                    "{request_path} '{}' is not a multiple of the page size {size_path} '{}'",
                    shown(raw_request),
                    hugepages.page_size
                ),
            )),
            Some(_) => {}
        }
    }

    if let Some(raw_guest) = memory.guest.as_ref() {
        let guest_path = field.child("domain").child("memory").child("guest");
        let guest = quantity_value(&guest_path, Some(raw_guest), &mut causes);
        if limit != 0 && limit < guest {
            causes.push(Cause::invalid(
                &guest_path,
                format!(
                    "{guest_path} '{raw_guest}' must be equal to or less than the memory \
                     limit {limit_path} '{}'",
                    shown(raw_limit)
                ),
            ));
        }
    }

    causes
}

fn validate_memory_hotplug(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
    config: &ClusterConfig,
) -> Vec<Cause> {
    let mut causes = Vec::new();
    let Some(memory) = spec.domain.memory.as_ref() else {
        return causes;
    };
    let Some(raw_max) = memory.max_guest.as_ref() else {
        return causes;
    };
    let memory_path = field.child("domain").child("memory");
    let guest_path = memory_path.child("guest");
    let max_path = memory_path.child("maxGuest");
    let alignment = config.memory_hotplug_block_alignment;

    let max_guest = quantity_value(&max_path, Some(raw_max), &mut causes);
    let guest = match memory.guest.as_ref() {
        Some(raw) => quantity_value(&guest_path, Some(raw), &mut causes),
        None => {
            causes.push(Cause::required(
                &guest_path,
                format!("{guest_path} must be set when {max_path} is set"),
            ));
            return causes;
        }
    };

    if guest > max_guest {
        causes.push(Cause::invalid(
            &guest_path,
            format!(
                "{guest_path} '{guest}' must be less than or equal to {max_path} '{max_guest}'"
            ),
        ));
    }
    if alignment > 0 {
        if guest % alignment != 0 {
            causes.push(Cause::invalid(
                &guest_path,
                format!(
                    "{guest_path} must be aligned to {} to support memory hotplug",
                    format_binary(alignment)
                ),
            ));
        }
        if max_guest % alignment != 0 {
            causes.push(Cause::invalid(
                &max_path,
                format!(
                    "{max_path} must be aligned to {} to support memory hotplug",
                    format_binary(alignment)
                ),
            ));
        }
    }
    causes
}

fn validate_cpu(field: &FieldPath, spec: &VirtualMachineInstanceSpec) -> Vec<Cause> {
    let mut causes = Vec::new();
    let Some(cpu) = spec.domain.cpu.as_ref() else {
        return causes;
    };
    let cpu_path = field.child("domain").child("cpu");

    if cpu.max_sockets != 0 && cpu.sockets > cpu.max_sockets {
        causes.push(Cause::invalid(
            cpu_path.child("sockets"),
            "Number of sockets in CPU topology is greater than the maximum sockets allowed",
        ));
    }

    let passthrough = cpu
        .numa
        .as_ref()
        .is_some_and(|n| n.guest_mapping_passthrough.is_some());
    if passthrough && !cpu.dedicated_cpu_placement {
        let numa_path = cpu_path.child("numa").child("guestMappingPassthrough");
        causes.push(Cause::invalid(
            &numa_path,
            format!(
                "{} must be set to true when NUMA topology strategy is set in {numa_path}",
                cpu_path.child("dedicatedCpuPlacement")
            ),
        ));
    }
    causes
}

fn validate_architecture(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
    config: &ClusterConfig,
) -> Vec<Cause> {
    match spec.architecture.as_deref() {
        Some(arch)
            if !arch.is_empty()
                && arch != config.default_architecture
                && !config.is_enabled(FeatureGate::MultiArchitecture) =>
        {
            let path = field.child("architecture");
            vec![Cause::invalid(
                &path,
                format!(
                    "multi-architecture feature gate is not enabled in kubevirt-config, \
                     invalid entry {path}"
                ),
            )]
        }
        _ => Vec::new(),
    }
}

/// Every disk must be backed by a volume; LUNs need a block source; boot
/// orders must be unique.
fn validate_disk_volume_mapping(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
) -> Vec<Cause> {
    let mut causes = Vec::new();
    let volumes: HashMap<&str, &Volume> =
        spec.volumes.iter().map(|v| (v.name.as_str(), v)).collect();
    let disks_path = field.child("domain").child("devices").child("disks");
    let mut boot_orders = HashSet::new();

    for (idx, disk) in spec.domain.devices.disks.iter().enumerate() {
        let disk_path = disks_path.index(idx);
        let volume = volumes.get(disk.name.as_str());
        match volume {
            None => causes.push(Cause::invalid(
                disk_path.child("name"),
                format!("{} '{}' not found.", disk_path.child("name"), disk.name),
            )),
            Some(volume) if disk.lun.is_some() && !volume.is_hotpluggable_source() => {
                let lun_path = disk_path.child("lun");
                causes.push(Cause::invalid(
                    &lun_path,
                    format!(
                        "{lun_path} can only be mapped to a DataVolume or \
                         PersistentVolumeClaim volume."
                    ),
                ));
            }
            Some(_) => {}
        }

        if let Some(order) = disk.boot_order {
            if !boot_orders.insert(order) {
                let order_path = disk_path.child("bootOrder");
                causes.push(Cause::invalid(
                    &order_path,
                    format!("Boot order for {order_path} already set for a different device."),
                ));
            }
        }
    }
    causes
}

fn validate_disks(path: &FieldPath, disks: &[Disk]) -> Vec<Cause> {
    let mut causes = Vec::new();
    let mut names: HashMap<&str, usize> = HashMap::new();

    for (idx, disk) in disks.iter().enumerate() {
        let disk_path = path.index(idx);
        if let Some(other) = names.get(disk.name.as_str()) {
            causes.push(Cause::duplicate(
                disk_path.child("name"),
                format!(
                    "{disk_path} and {} must not have the same Name.",
                    path.index(*other)
                ),
            ));
        } else {
            names.insert(disk.name.as_str(), idx);
        }

        let targets = disk.targets();
        if targets.len() > 1 {
            causes.push(Cause::invalid(
                &disk_path,
                format!("{disk_path} can only have a single target type defined"),
            ));
        }

        if disk.boot_order.is_some_and(|o| o < 1) {
            causes.push(Cause::invalid(
                disk_path.child("bootOrder"),
                format!("{disk_path} must have a boot order > 0, if supplied"),
            ));
        }

        let (kind, bus) = disk.device();
        if let Some(bus) = bus.filter(|b| !b.is_empty()) {
            let bus_path = disk_path.child(&kind.to_string()).child("bus");
            if !VALID_BUSES.contains(&bus) {
                causes.push(Cause::not_supported(
                    &bus_path,
                    format!(
                        "{disk_path} is set with an unrecognized bus {bus}, must be one of: [{}]",
                        VALID_BUSES.join(" ")
                    ),
                ));
            }
            if kind == DiskKind::Cdrom && bus == "virtio" {
                causes.push(Cause::invalid(
                    &bus_path,
                    format!("Bus type {bus} is invalid for CD-ROM device"),
                ));
            }
            if disk.dedicated_io_thread == Some(true) && bus == "sata" {
                causes.push(Cause::not_supported(
                    &disk_path,
                    "IOThreads are not supported for disks on a SATA bus",
                ));
            }
        }

        if let Some(serial) = disk.serial.as_deref().filter(|s| !s.is_empty()) {
            if !is_valid_serial(serial) {
                causes.push(Cause::invalid(
                    disk_path.child("serial"),
                    format!(
                        "{disk_path} must be made up of the following characters \
                         [A-Za-z0-9_.+-], if specified"
                    ),
                ));
            }
            if serial.chars().count() > MAX_SERIAL_LEN {
                causes.push(Cause::too_long(
                    disk_path.child("serial"),
                    format!(
                        "{disk_path} must be less than or equal to {MAX_SERIAL_LEN} in length, \
                         if specified"
                    ),
                ));
            }
        }

        if let Some(cache) = disk.cache.as_deref().filter(|c| !c.is_empty()) {
            if !VALID_CACHE_MODES.contains(&cache) {
                let cache_path = disk_path.child("cache");
                causes.push(Cause::not_supported(
                    &cache_path,
                    format!("{cache_path} has invalid value {cache}"),
                ));
            }
        }
    }
    causes
}

fn validate_volumes(path: &FieldPath, volumes: &[Volume], config: &ClusterConfig) -> Vec<Cause> {
    let mut causes = Vec::new();
    let mut names: HashMap<&str, usize> = HashMap::new();

    for (idx, volume) in volumes.iter().enumerate() {
        let volume_path = path.index(idx);
        if let Some(other) = names.get(volume.name.as_str()) {
            causes.push(Cause::duplicate(
                volume_path.child("name"),
                format!(
                    "{volume_path} and {} must not have the same Name.",
                    path.index(*other)
                ),
            ));
        } else {
            names.insert(volume.name.as_str(), idx);
        }

        if volume.sources().len() != 1 {
            causes.push(Cause::invalid(
                &volume_path,
                format!("{volume_path} must have exactly one source type set"),
            ));
        }

        if let Some(dv) = volume.data_volume.as_ref() {
            if dv.name.is_empty() {
                causes.push(Cause::required(
                    volume_path.child("name"),
                    "DataVolume 'name' must be set",
                ));
            }
        }

        if let Some(source) = volume.cloud_init_no_cloud.as_ref() {
            causes.extend(validate_cloud_init(
                &volume_path.child("cloudInitNoCloud"),
                source,
                config,
            ));
        } else if let Some(source) = volume.cloud_init_config_drive.as_ref() {
            causes.extend(validate_cloud_init(
                &volume_path.child("cloudInitConfigDrive"),
                source,
                config,
            ));
        }

        if let Some(host_disk) = volume.host_disk.as_ref() {
            let host_path = volume_path.child("hostDisk");
            if !config.is_enabled(FeatureGate::HostDisk) {
                causes.push(Cause::invalid(&host_path, "HostDisk feature gate is not enabled"));
            } else {
                if host_disk.path.is_empty() {
                    let p = host_path.child("path");
                    let message = format!("{p} is required for hostDisk volume");
                    causes.push(Cause::required(&p, message));
                }
                if !HOST_DISK_TYPES.contains(&host_disk.type_.as_str()) {
                    let t = host_path.child("type");
                    causes.push(Cause::not_supported(
                        &t,
                        format!(
                            "{t} has invalid value '{}', allowed are '{}' or '{}'",
                            host_disk.type_, HOST_DISK_TYPES[0], HOST_DISK_TYPES[1]
                        ),
                    ));
                } else if host_disk.capacity.is_some() && host_disk.type_ != HOST_DISK_TYPES[1] {
                    let c = host_path.child("capacity");
                    causes.push(Cause::invalid(
                        &c,
                        format!(
                            "{c} is allowed to pass only with {} equal to '{}'",
                            host_path.child("type"),
                            HOST_DISK_TYPES[1]
                        ),
                    ));
                }
            }
        }

        if volume.config_map.as_ref().is_some_and(|c| c.name.is_empty()) {
            let p = volume_path.child("configMap").child("name");
            causes.push(Cause::required(&p, format!("{p} is a required field")));
        }
        if volume.secret.as_ref().is_some_and(|s| s.secret_name.is_empty()) {
            let p = volume_path.child("secret").child("secretName");
            causes.push(Cause::required(&p, format!("{p} is a required field")));
        }
    }
    causes
}

fn validate_cloud_init(
    path: &FieldPath,
    source: &CloudInitSource,
    config: &ClusterConfig,
) -> Vec<Cause> {
    let mut causes = Vec::new();
    let mut sources = 0;
    let mut user_data_len = 0;

    if source
        .user_data_secret_ref
        .as_ref()
        .is_some_and(|r| !r.name.is_empty())
    {
        sources += 1;
    }
    if let Some(data) = source.user_data.as_deref().filter(|d| !d.is_empty()) {
        sources += 1;
        user_data_len = data.len();
    }
    if let Some(data) = source.user_data_base64.as_deref().filter(|d| !d.is_empty()) {
        sources += 1;
        match BASE64.decode(data) {
            Ok(decoded) => user_data_len = decoded.len(),
            Err(_) => {
                let p = path.child("userDataBase64");
                causes.push(Cause::invalid(
                    &p,
                    format!("{p} is not a valid base64 value."),
                ));
            }
        }
    }

    let has_network_data = source.network_data.as_deref().is_some_and(|d| !d.is_empty());
    if sources > 1 {
        causes.push(Cause::invalid(
            path,
            format!("{path} must have only one userdatasource set."),
        ));
    } else if sources == 0 && !has_network_data {
        causes.push(Cause::required(
            path,
            format!("{path} must have at least one userdatasource or one networkdatasource set."),
        ));
    }

    if user_data_len > config.max_cloud_init_user_data_bytes {
        causes.push(Cause::too_long(
            path,
            format!(
                "{path} userdata exceeds {} byte limit. Should use UserDataSecretRef for \
                 larger data.",
                config.max_cloud_init_user_data_bytes
            ),
        ));
    }
    causes
}

/// Every volume must be consumed by a disk.
fn validate_volume_disks(field: &FieldPath, spec: &VirtualMachineInstanceSpec) -> Vec<Cause> {
    let disk_names: HashSet<&str> = spec
        .domain
        .devices
        .disks
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    spec.volumes
        .iter()
        .enumerate()
        .filter(|(_, v)| !disk_names.contains(v.name.as_str()))
        .map(|(idx, volume)| {
            let p = field.child("volumes").index(idx).child("name");
            Cause::invalid(&p, format!("{p} '{}' not found.", volume.name))
        })
        .collect()
}

fn validate_launch_security(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
    config: &ClusterConfig,
) -> Vec<Cause> {
    let sev = spec
        .domain
        .launch_security
        .as_ref()
        .is_some_and(|l| l.sev.is_some());
    let path = field.child("domain").child("launchSecurity");
    if sev && !config.is_enabled(FeatureGate::WorkloadEncryptionSev) {
        return vec![Cause::invalid(
            &path,
            format!(
                "{} feature gate is not enabled in kubevirt-config",
                FeatureGate::WorkloadEncryptionSev.name()
            ),
        )];
    }
    if !sev {
        return Vec::new();
    }
    // Firmware cannot boot from a NIC inside an encrypted guest.
    spec.domain
        .devices
        .interfaces
        .iter()
        .filter(|iface| iface.boot_order.is_some())
        .map(|iface| {
            Cause::invalid(
                &path,
                format!("SEV does not work with bootable NICs: {}", iface.name),
            )
        })
        .collect()
}
