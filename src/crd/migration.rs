//! Live migration resources: VirtualMachineInstanceMigration and
//! MigrationPolicy.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Unmodelled;

/// Label linking a migration to the instance it moves.
pub const MIGRATION_SELECTOR_LABEL: &str = "kubevirt.io/vmi-name";

/// A request to live migrate one instance to another node.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstanceMigration",
    plural = "virtualmachineinstancemigrations",
    shortname = "vmim",
    status = "MigrationStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"VMI","type":"string","jsonPath":".spec.vmiName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceMigrationSpec {
    /// Name of the instance to migrate, in the migration's namespace.
    #[serde(default)]
    pub vmi_name: String,

    /// Extra node labels the target must carry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub added_node_selector: BTreeMap<String, String>,

    /// Source side of a decentralized migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_to: Option<MigrationSendTo>,

    /// Target side of a decentralized migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive: Option<MigrationReceive>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct MigrationSendTo {
    #[serde(rename = "connectURL")]
    pub connect_url: String,

    #[serde(rename = "migrationID")]
    pub migration_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct MigrationReceive {
    #[serde(rename = "migrationID")]
    pub migration_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<MigrationPhase>,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

/// Lifecycle phase of a migration. Phases added by newer controllers decode
/// as `Unknown`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum MigrationPhase {
    Pending,
    /// Decentralized migration waiting for its peer to connect.
    WaitingForSync,
    /// Decentralized migration exchanging state with its peer.
    Synchronizing,
    Scheduling,
    Scheduled,
    PreparingTarget,
    TargetReady,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl MigrationPhase {
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::WaitingForSync => "WaitingForSync",
            Self::Synchronizing => "Synchronizing",
            Self::Scheduling => "Scheduling",
            Self::Scheduled => "Scheduled",
            Self::PreparingTarget => "PreparingTarget",
            Self::TargetReady => "TargetReady",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

impl VirtualMachineInstanceMigration {
    pub fn phase(&self) -> Option<MigrationPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// A migration without a phase has not been picked up yet and still
    /// counts as in flight.
    pub fn is_final(&self) -> bool {
        self.phase().is_some_and(MigrationPhase::is_final)
    }
}

/// Cluster-wide tuning applied to migrations of matching instances.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "migrations.kubevirt.io",
    version = "v1alpha1",
    kind = "MigrationPolicy",
    plural = "migrationpolicies",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_auto_converge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_post_copy: Option<bool>,

    /// Bandwidth cap as a quantity, e.g. "64Mi".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_per_migration: Option<String>,

    #[serde(
        default,
        rename = "completionTimeoutPerGiB",
        skip_serializing_if = "Option::is_none"
    )]
    pub completion_timeout_per_gib: Option<i64>,

    #[serde(default)]
    pub selectors: MigrationPolicySelectors,

    #[serde(flatten)]
    pub extra: Unmodelled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPolicySelectors {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_selector: BTreeMap<String, String>,

    #[serde(
        default,
        rename = "virtualMachineInstanceSelector",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub instance_selector: BTreeMap<String, String>,
}
