//! Flavor, instancetype and preference resources.
//!
//! Namespaced and cluster-scoped variants share their spec shape; the
//! [`ProfileSet`] and [`InstancetypeResources`] traits let validators treat
//! both the same way.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;
use super::instance::Numa;

/// API versions under which preferences are served.
pub const PREFERENCE_VERSIONS: [&str; 3] = ["v1alpha1", "v1alpha2", "v1beta1"];

/// Named hardware profiles; at most one may be the default.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "flavor.kubevirt.io",
    version = "v1alpha1",
    kind = "VirtualMachineFlavor",
    plural = "virtualmachineflavors",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineFlavorSpec {
    #[serde(default)]
    pub profiles: Vec<FlavorProfile>,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "flavor.kubevirt.io",
    version = "v1alpha1",
    kind = "VirtualMachineClusterFlavor",
    plural = "virtualmachineclusterflavors",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClusterFlavorSpec {
    #[serde(default)]
    pub profiles: Vec<FlavorProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlavorProfile {
    pub name: String,

    #[serde(default)]
    pub default: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuInstancetype>,
}

/// CPU shape shared by flavor profiles and instancetypes.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CpuInstancetype {
    #[serde(default)]
    pub guest: u32,

    #[serde(default, rename = "dedicatedCPUPlacement")]
    pub dedicated_cpu_placement: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInstancetype {
    #[serde(default)]
    pub guest: String,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Fixed guest resources offered to virtual machines.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineInstancetype",
    plural = "virtualmachineinstancetypes",
    shortname = "vminstancetype",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstancetypeSpec {
    #[serde(default)]
    pub cpu: CpuInstancetype,

    #[serde(default)]
    pub memory: MemoryInstancetype,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineClusterInstancetype",
    plural = "virtualmachineclusterinstancetypes",
    shortname = "vmclusterinstancetype",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClusterInstancetypeSpec {
    #[serde(default)]
    pub cpu: CpuInstancetype,

    #[serde(default)]
    pub memory: MemoryInstancetype,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Preferred guest settings applied when the VM does not set them.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachinePreference",
    plural = "virtualmachinepreferences",
    shortname = "vmpref",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachinePreferenceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuPreference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_termination_grace_period_seconds: Option<i64>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "instancetype.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineClusterPreference",
    plural = "virtualmachineclusterpreferences",
    shortname = "vmclusterpref",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClusterPreferenceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuPreference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_termination_grace_period_seconds: Option<i64>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CpuPreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_cpu_topology: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Resources carrying flavor profiles.
pub trait ProfileSet {
    fn profiles(&self) -> &[FlavorProfile];
}

impl ProfileSet for VirtualMachineFlavor {
    fn profiles(&self) -> &[FlavorProfile] {
        &self.spec.profiles
    }
}

impl ProfileSet for VirtualMachineClusterFlavor {
    fn profiles(&self) -> &[FlavorProfile] {
        &self.spec.profiles
    }
}

/// Resources carrying a fixed CPU shape.
pub trait InstancetypeResources {
    fn cpu(&self) -> &CpuInstancetype;
}

impl InstancetypeResources for VirtualMachineInstancetype {
    fn cpu(&self) -> &CpuInstancetype {
        &self.spec.cpu
    }
}

impl InstancetypeResources for VirtualMachineClusterInstancetype {
    fn cpu(&self) -> &CpuInstancetype {
        &self.spec.cpu
    }
}
