//! VirtualMachineClone Custom Resource.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;
use super::snapshot::TypedObjectReference;

/// Copies a VirtualMachine or a VirtualMachineSnapshot into a new
/// VirtualMachine, optionally filtering metadata and patching the result.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "clone.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineClone",
    plural = "virtualmachineclones",
    shortname = "vmclone",
    status = "VirtualMachineCloneStatus",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineCloneSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TypedObjectReference>,

    /// Defaults to a generated VirtualMachine name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TypedObjectReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_filters: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotation_filters: Vec<String>,

    /// Filters applied to the VM template's metadata.
    #[serde(default)]
    pub template: CloneTemplateFilters,

    /// Interface name to replacement MAC address.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub new_mac_addresses: BTreeMap<String, String>,

    /// JSON patches applied to the cloned VirtualMachine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloneTemplateFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_filters: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotation_filters: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineCloneStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}
