//! VirtualMachineExport Custom Resource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;
use super::snapshot::TypedObjectReference;

/// Source kinds an export may serve, paired with their API group.
pub const EXPORT_SOURCES: [(&str, &str); 3] = [
    ("", "PersistentVolumeClaim"),
    ("snapshot.kubevirt.io", "VirtualMachineSnapshot"),
    ("kubevirt.io", "VirtualMachine"),
];

/// Serves the disks of a claim, snapshot or VirtualMachine for download.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "export.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineExport",
    plural = "virtualmachineexports",
    shortname = "vmexport",
    status = "VirtualMachineExportStatus",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineExportSpec {
    #[serde(default)]
    pub source: TypedObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_duration: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineExportStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}
