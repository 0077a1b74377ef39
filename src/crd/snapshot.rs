//! Snapshot and restore resources.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;

/// Reference to an object in the same namespace, qualified by API group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,
}

impl TypedObjectReference {
    pub fn new(api_group: &str, kind: &str, name: &str) -> Self {
        Self {
            api_group: Some(api_group.to_string()),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn api_group(&self) -> &str {
        self.api_group.as_deref().unwrap_or_default()
    }
}

/// Point-in-time copy of a VirtualMachine.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "snapshot.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineSnapshot",
    plural = "virtualmachinesnapshots",
    shortname = "vmsnapshot",
    status = "VirtualMachineSnapshotStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"SourceKind","type":"string","jsonPath":".spec.source.kind"}"#,
    printcolumn = r#"{"name":"SourceName","type":"string","jsonPath":".spec.source.name"}"#,
    printcolumn = r#"{"name":"ReadyToUse","type":"boolean","jsonPath":".status.readyToUse"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSnapshotSpec {
    #[serde(default)]
    pub source: TypedObjectReference,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSnapshotStatus {
    /// UID of the VirtualMachine that was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_snapshot_content_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<SnapshotPhase>,

    #[serde(default)]
    pub ready_to_use: bool,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum SnapshotPhase {
    InProgress,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl VirtualMachineSnapshot {
    pub fn is_failed(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.phase == Some(SnapshotPhase::Failed))
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready_to_use)
    }

    pub fn content_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.virtual_machine_snapshot_content_name.as_deref())
    }

    pub fn source_uid(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.source_uid.as_deref())
    }
}

/// Stored data backing a VirtualMachineSnapshot.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "snapshot.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineSnapshotContent",
    plural = "virtualmachinesnapshotcontents",
    shortname = "vmsnapshotcontent",
    status = "VirtualMachineSnapshotContentStatus",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSnapshotContentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_machine_snapshot_name: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSnapshotContentStatus {
    #[serde(default)]
    pub ready_to_use: bool,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Restores a VirtualMachine from a snapshot.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "snapshot.kubevirt.io",
    version = "v1beta1",
    kind = "VirtualMachineRestore",
    plural = "virtualmachinerestores",
    shortname = "vmrestore",
    status = "VirtualMachineRestoreStatus",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineRestoreSpec {
    #[serde(default)]
    pub target: TypedObjectReference,

    #[serde(default)]
    pub virtual_machine_snapshot_name: String,

    /// JSON patch operations applied to the restored VirtualMachine, one
    /// operation (or operation list) per entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineRestoreStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

impl VirtualMachineRestore {
    pub fn is_complete(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.complete)
            .unwrap_or(false)
    }
}
