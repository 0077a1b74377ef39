//! VirtualMachineInstance Custom Resource and the instance spec shared with
//! VirtualMachine templates.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;

/// Condition type reporting whether a running instance can be live migrated.
pub const CONDITION_LIVE_MIGRATABLE: &str = "LiveMigratable";

/// A running virtual machine.
///
/// Instances are created by the controller from a VirtualMachine template,
/// so the spec here is the same shape validated inside
/// `VirtualMachine.spec.template.spec`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    plural = "virtualmachineinstances",
    shortname = "vmi",
    status = "VirtualMachineInstanceStatus",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Guest hardware.
    pub domain: DomainSpec,

    /// Volumes backing the disks listed in `domain.devices.disks`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Guest CPU architecture (defaults to the cluster default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    /// Node labels the instance must be scheduled on.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// What to do with the instance when its node is drained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,

    /// Networks the interfaces in `domain.devices.interfaces` connect to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Guest hardware description.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(default)]
    pub resources: ResourceRequirements,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,

    #[serde(default)]
    pub devices: Devices,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_security: Option<LaunchSecurity>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Compute resource requests and limits keyed by resource name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// CPU topology.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    #[serde(default)]
    pub cores: u32,

    #[serde(default)]
    pub sockets: u32,

    #[serde(default)]
    pub threads: u32,

    /// Upper bound for CPU hotplug.
    #[serde(default)]
    pub max_sockets: u32,

    #[serde(default, rename = "dedicatedCpuPlacement")]
    pub dedicated_cpu_placement: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Guest NUMA topology.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Numa {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_mapping_passthrough: Option<GuestMappingPassthrough>,
}

/// Marker enabling host NUMA passthrough.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct GuestMappingPassthrough {}

/// Guest memory.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Memory visible to the guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<String>,

    /// Upper bound for memory hotplug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Hugepages {
    pub page_size: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSecurity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sev: Option<Sev>,
}

/// AMD Secure Encrypted Virtualization.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Sev {}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// A disk attached to the guest. Exactly one of `disk`, `lun` and `cdrom`
/// selects the target device type; none means a plain disk.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Name of the volume backing this disk.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<DiskTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdrom: Option<DiskTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,

    #[serde(default, rename = "dedicatedIOThread", skip_serializing_if = "Option::is_none")]
    pub dedicated_io_thread: Option<bool>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Device type of a disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskKind {
    Disk,
    Lun,
    Cdrom,
}

impl std::fmt::Display for DiskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disk => write!(f, "disk"),
            Self::Lun => write!(f, "lun"),
            Self::Cdrom => write!(f, "cdrom"),
        }
    }
}

impl Disk {
    /// Device targets set on this disk, in declaration order.
    pub fn targets(&self) -> Vec<(DiskKind, &DiskTarget)> {
        [
            (DiskKind::Disk, self.disk.as_ref()),
            (DiskKind::Lun, self.lun.as_ref()),
            (DiskKind::Cdrom, self.cdrom.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, target)| target.map(|t| (kind, t)))
        .collect()
    }

    /// Device type and bus, defaulting to a plain disk without a bus.
    pub fn device(&self) -> (DiskKind, Option<&str>) {
        self.targets()
            .first()
            .map_or((DiskKind::Disk, None), |(kind, target)| {
                (*kind, target.bus.as_deref())
            })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// A named volume. Exactly one source field must be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_disk: Option<ContainerDiskSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume: Option<DataVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_disk: Option<HostDiskSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init_no_cloud: Option<CloudInitSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init_config_drive: Option<CloudInitSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_disk: Option<EmptyDiskSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretSource>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

impl Volume {
    /// Names of the source fields that are set.
    pub fn sources(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.container_disk.is_some() {
            sources.push("containerDisk");
        }
        if self.persistent_volume_claim.is_some() {
            sources.push("persistentVolumeClaim");
        }
        if self.data_volume.is_some() {
            sources.push("dataVolume");
        }
        if self.host_disk.is_some() {
            sources.push("hostDisk");
        }
        if self.cloud_init_no_cloud.is_some() {
            sources.push("cloudInitNoCloud");
        }
        if self.cloud_init_config_drive.is_some() {
            sources.push("cloudInitConfigDrive");
        }
        if self.empty_disk.is_some() {
            sources.push("emptyDisk");
        }
        if self.config_map.is_some() {
            sources.push("configMap");
        }
        if self.secret.is_some() {
            sources.push("secret");
        }
        sources
    }

    /// Whether the source can be attached to a running instance.
    pub fn is_hotpluggable_source(&self) -> bool {
        self.persistent_volume_claim.is_some() || self.data_volume.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDiskSource {
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSource {
    pub claim_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotpluggable: Option<bool>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSource {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotpluggable: Option<bool>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostDiskSource {
    pub path: String,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
}

/// Cloud-init payload, inline or from a secret.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudInitSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret_ref: Option<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_data: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmptyDiskSource {
    pub capacity: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapSource {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    pub secret_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

// ============================================================================
// Networking
// ============================================================================

/// A guest network interface. At most one binding method or a binding plugin
/// selects how it is wired to its network; none means bridge.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// Name of the network this interface connects to.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BindingMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slirp: Option<BindingMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<BindingMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sriov: Option<BindingMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macvtap: Option<BindingMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passt: Option<BindingMethod>,

    /// Binding implemented by a registered network binding plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<PluginBinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_options: Option<DhcpOptions>,

    /// Link state: empty for up, or "absent" to hot-unplug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Binding methods built into the virt-launcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    Bridge,
    Slirp,
    Masquerade,
    Sriov,
    Macvtap,
    Passt,
}

impl Interface {
    /// Built-in binding methods set on this interface.
    pub fn bindings(&self) -> Vec<Binding> {
        [
            (Binding::Bridge, self.bridge.is_some()),
            (Binding::Slirp, self.slirp.is_some()),
            (Binding::Masquerade, self.masquerade.is_some()),
            (Binding::Sriov, self.sriov.is_some()),
            (Binding::Macvtap, self.macvtap.is_some()),
            (Binding::Passt, self.passt.is_some()),
        ]
        .into_iter()
        .filter_map(|(binding, set)| set.then_some(binding))
        .collect()
    }

    /// Whether the interface is wired with `binding`, counting an interface
    /// without any method as bridge.
    pub fn uses(&self, binding: Binding) -> bool {
        let bindings = self.bindings();
        if bindings.is_empty() && self.binding.is_none() {
            return binding == Binding::Bridge;
        }
        bindings.contains(&binding)
    }
}

/// Marker selecting a built-in binding method.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct BindingMethod {}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PluginBinding {
    pub name: String,
}

/// A port forwarded to the guest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Port {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// "TCP" or "UDP"; TCP when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default)]
    pub port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DhcpOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tftp_server_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ntp_servers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_options: Vec<DhcpPrivateOption>,
}

/// A site-specific DHCP option.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DhcpPrivateOption {
    pub option: i32,
    pub value: String,
}

/// A network an interface can connect to. Exactly one source field is set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,
}

impl Network {
    /// Whether this network is the pod network, or the Multus network that
    /// replaces it.
    pub fn is_default(&self) -> bool {
        self.pod.is_some() || self.multus.as_ref().is_some_and(|m| m.default)
    }
}

/// The default Kubernetes pod network.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PodNetwork {
    #[serde(
        default,
        rename = "vmNetworkCIDR",
        skip_serializing_if = "Option::is_none"
    )]
    pub vm_network_cidr: Option<String>,

    #[serde(
        default,
        rename = "vmIPv6NetworkCIDR",
        skip_serializing_if = "Option::is_none"
    )]
    pub vm_ipv6_network_cidr: Option<String>,
}

/// A secondary network attached through Multus.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    #[serde(default)]
    pub network_name: String,

    /// Replace the pod network with this one.
    #[serde(default)]
    pub default: bool,
}

// ============================================================================
// Status
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<VmiPhase>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VmiCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_state: Option<MigrationState>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Lifecycle phase of an instance. Phases added by newer controllers decode
/// as `Unknown`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum VmiPhase {
    Pending,
    /// Target of a decentralized migration waiting for the source.
    WaitingForSync,
    Scheduling,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl VmiPhase {
    /// Succeeded and Failed instances never run again.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiCondition {
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown".
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Progress of the most recent live migration of an instance.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_uid: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub failed: bool,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

impl VirtualMachineInstance {
    pub fn phase(&self) -> Option<VmiPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Whether the instance reached a terminal phase.
    pub fn is_final(&self) -> bool {
        self.phase().is_some_and(VmiPhase::is_final)
    }

    /// Whether the instance is being deleted.
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// A migration has started and neither completed nor failed.
    pub fn is_migrating(&self) -> bool {
        self.migration_state()
            .is_some_and(|m| m.source_node.is_some() && !m.completed && !m.failed)
    }

    pub fn migration_state(&self) -> Option<&MigrationState> {
        self.status.as_ref().and_then(|s| s.migration_state.as_ref())
    }

    pub fn node_name(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.node_name.as_deref())
    }

    pub fn condition(&self, type_: &str) -> Option<&VmiCondition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == type_))
    }

    /// The `LiveMigratable` condition, when reported.
    pub fn migratable_condition(&self) -> Option<&VmiCondition> {
        self.condition(CONDITION_LIVE_MIGRATABLE)
    }
}
