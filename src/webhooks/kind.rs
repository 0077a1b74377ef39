//! The closed set of resource kinds served by the admission webhooks.

use std::fmt;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

use crate::crd::{
    self, KubeVirt, MigrationPolicy, VirtualMachine, VirtualMachineClone,
    VirtualMachineClusterFlavor, VirtualMachineClusterInstancetype,
    VirtualMachineClusterPreference, VirtualMachineExport, VirtualMachineFlavor,
    VirtualMachineInstance, VirtualMachineInstanceMigration, VirtualMachineInstancetype,
    VirtualMachinePreference, VirtualMachineRestore, VirtualMachineSnapshot,
};

/// A resource kind with its own validation endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    VirtualMachine,
    VirtualMachineInstance,
    Migration,
    MigrationPolicy,
    Flavor,
    ClusterFlavor,
    Instancetype,
    ClusterInstancetype,
    Preference,
    ClusterPreference,
    Snapshot,
    Restore,
    Clone,
    Export,
    KubeVirt,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::VirtualMachine,
        ResourceKind::VirtualMachineInstance,
        ResourceKind::Migration,
        ResourceKind::MigrationPolicy,
        ResourceKind::Flavor,
        ResourceKind::ClusterFlavor,
        ResourceKind::Instancetype,
        ResourceKind::ClusterInstancetype,
        ResourceKind::Preference,
        ResourceKind::ClusterPreference,
        ResourceKind::Snapshot,
        ResourceKind::Restore,
        ResourceKind::Clone,
        ResourceKind::Export,
        ResourceKind::KubeVirt,
    ];

    pub const fn group(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine
            | ResourceKind::VirtualMachineInstance
            | ResourceKind::Migration
            | ResourceKind::KubeVirt => crd::CORE_GROUP,
            ResourceKind::MigrationPolicy => crd::MIGRATIONS_GROUP,
            ResourceKind::Flavor | ResourceKind::ClusterFlavor => crd::FLAVOR_GROUP,
            ResourceKind::Instancetype
            | ResourceKind::ClusterInstancetype
            | ResourceKind::Preference
            | ResourceKind::ClusterPreference => crd::INSTANCETYPE_GROUP,
            ResourceKind::Snapshot | ResourceKind::Restore => crd::SNAPSHOT_GROUP,
            ResourceKind::Clone => crd::CLONE_GROUP,
            ResourceKind::Export => crd::EXPORT_GROUP,
        }
    }

    /// Plural resource name as it appears in the request's resource.
    pub const fn plural(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "virtualmachines",
            ResourceKind::VirtualMachineInstance => "virtualmachineinstances",
            ResourceKind::Migration => "virtualmachineinstancemigrations",
            ResourceKind::MigrationPolicy => "migrationpolicies",
            ResourceKind::Flavor => "virtualmachineflavors",
            ResourceKind::ClusterFlavor => "virtualmachineclusterflavors",
            ResourceKind::Instancetype => "virtualmachineinstancetypes",
            ResourceKind::ClusterInstancetype => "virtualmachineclusterinstancetypes",
            ResourceKind::Preference => "virtualmachinepreferences",
            ResourceKind::ClusterPreference => "virtualmachineclusterpreferences",
            ResourceKind::Snapshot => "virtualmachinesnapshots",
            ResourceKind::Restore => "virtualmachinerestores",
            ResourceKind::Clone => "virtualmachineclones",
            ResourceKind::Export => "virtualmachineexports",
            ResourceKind::KubeVirt => "kubevirts",
        }
    }

    /// Kind name used in decode errors and metrics.
    pub const fn kind(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "VirtualMachine",
            ResourceKind::VirtualMachineInstance => "VirtualMachineInstance",
            ResourceKind::Migration => "VirtualMachineInstanceMigration",
            ResourceKind::MigrationPolicy => "MigrationPolicy",
            ResourceKind::Flavor => "VirtualMachineFlavor",
            ResourceKind::ClusterFlavor => "VirtualMachineClusterFlavor",
            ResourceKind::Instancetype => "VirtualMachineInstancetype",
            ResourceKind::ClusterInstancetype => "VirtualMachineClusterInstancetype",
            ResourceKind::Preference => "VirtualMachinePreference",
            ResourceKind::ClusterPreference => "VirtualMachineClusterPreference",
            ResourceKind::Snapshot => "VirtualMachineSnapshot",
            ResourceKind::Restore => "VirtualMachineRestore",
            ResourceKind::Clone => "VirtualMachineClone",
            ResourceKind::Export => "VirtualMachineExport",
            ResourceKind::KubeVirt => "KubeVirt",
        }
    }

    /// HTTP path of the validation endpoint for this kind.
    pub fn endpoint(self) -> String {
        format!("/validate-{}", self.plural())
    }

    /// The `group/resource` string expected in requests for this kind.
    pub fn group_resource(self) -> String {
        format!("{}/{}", self.group(), self.plural())
    }

    /// Generated definition carrying the structural schema of this kind.
    pub fn crd(self) -> CustomResourceDefinition {
        match self {
            ResourceKind::VirtualMachine => VirtualMachine::crd(),
            ResourceKind::VirtualMachineInstance => VirtualMachineInstance::crd(),
            ResourceKind::Migration => VirtualMachineInstanceMigration::crd(),
            ResourceKind::MigrationPolicy => MigrationPolicy::crd(),
            ResourceKind::Flavor => VirtualMachineFlavor::crd(),
            ResourceKind::ClusterFlavor => VirtualMachineClusterFlavor::crd(),
            ResourceKind::Instancetype => VirtualMachineInstancetype::crd(),
            ResourceKind::ClusterInstancetype => VirtualMachineClusterInstancetype::crd(),
            ResourceKind::Preference => VirtualMachinePreference::crd(),
            ResourceKind::ClusterPreference => VirtualMachineClusterPreference::crd(),
            ResourceKind::Snapshot => VirtualMachineSnapshot::crd(),
            ResourceKind::Restore => VirtualMachineRestore::crd(),
            ResourceKind::Clone => VirtualMachineClone::crd(),
            ResourceKind::Export => VirtualMachineExport::crd(),
            ResourceKind::KubeVirt => KubeVirt::crd(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
