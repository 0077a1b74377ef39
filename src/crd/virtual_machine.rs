//! VirtualMachine Custom Resource.
//!
//! A VirtualMachine owns a template from which the controller creates a
//! VirtualMachineInstance whenever the run strategy says it should run.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;
use super::instance::{ClaimSource, DataVolumeSource, Disk, VirtualMachineInstanceSpec, Volume};

/// Run strategies understood by the controller.
pub mod run_strategy {
    pub const ALWAYS: &str = "Always";
    pub const RERUN_ON_FAILURE: &str = "RerunOnFailure";
    pub const MANUAL: &str = "Manual";
    pub const HALTED: &str = "Halted";
    pub const ONCE: &str = "Once";
    /// Target side of a decentralized live migration.
    pub const WAIT_AS_RECEIVER: &str = "WaitAsReceiver";

    /// Strategies accepted without any feature gate.
    pub const STANDARD: [&str; 5] = [ALWAYS, RERUN_ON_FAILURE, MANUAL, HALTED, ONCE];
}

/// A stateful virtual machine.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    plural = "virtualmachines",
    shortname = "vm",
    status = "VirtualMachineStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Legacy on/off switch, mutually exclusive with `runStrategy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,

    /// Template for the instance started by this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<VirtualMachineInstanceTemplateSpec>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceTemplateSpec {
    #[serde(default)]
    pub metadata: TemplateMeta,

    pub spec: VirtualMachineInstanceSpec,
}

/// The metadata fields a template may carry into the created instance.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    /// Whether the instance of this machine is running and ready.
    #[serde(default)]
    pub ready: bool,

    /// Pending hotplug requests, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_requests: Vec<VolumeRequest>,

    /// Name of the snapshot currently being taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_in_progress: Option<String>,

    /// Name of the restore currently being applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_in_progress: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<String>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// A request to hot-plug or hot-unplug a volume. Exactly one option is set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_volume_options: Option<AddVolumeOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_volume_options: Option<RemoveVolumeOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddVolumeOptions {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<Disk>,

    #[serde(default)]
    pub volume_source: HotplugVolumeSource,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

impl AddVolumeOptions {
    /// The volume this request adds to the instance spec.
    pub fn to_volume(&self) -> Volume {
        Volume {
            name: self.name.clone(),
            persistent_volume_claim: self.volume_source.persistent_volume_claim.clone(),
            data_volume: self.volume_source.data_volume.clone(),
            ..Default::default()
        }
    }
}

/// Sources that can be attached to a running instance.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HotplugVolumeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume: Option<DataVolumeSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveVolumeOptions {
    pub name: String,
}

impl VolumeRequest {
    /// Name of the volume targeted by whichever option is set.
    pub fn name(&self) -> Option<&str> {
        self.add_volume_options
            .as_ref()
            .map(|o| o.name.as_str())
            .or_else(|| self.remove_volume_options.as_ref().map(|o| o.name.as_str()))
    }
}

impl VirtualMachine {
    /// Effective run strategy, derived from `running` when unset.
    pub fn run_strategy(&self) -> Option<&str> {
        match (&self.spec.run_strategy, self.spec.running) {
            (Some(strategy), _) => Some(strategy.as_str()),
            (None, Some(true)) => Some(run_strategy::ALWAYS),
            (None, Some(false)) => Some(run_strategy::HALTED),
            (None, None) => None,
        }
    }

    /// Whether the machine is currently expected to be running.
    pub fn is_running(&self) -> bool {
        self.spec.running == Some(true)
            || self
                .spec
                .run_strategy
                .as_deref()
                .is_some_and(|s| s != run_strategy::HALTED)
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    pub fn volume_requests(&self) -> &[VolumeRequest] {
        self.status
            .as_ref()
            .map_or(&[], |s| s.volume_requests.as_slice())
    }

    pub fn snapshot_in_progress(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.snapshot_in_progress.as_deref())
    }

    pub fn restore_in_progress(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.restore_in_progress.as_deref())
    }
}
