//! In-memory cluster state with a fixed object set.
//!
//! Used by tests and dry evaluation. Objects are matched by namespace and
//! name; [`StaticClusterState::failing`] makes every lookup return an error.

use kube::ResourceExt;

use super::{ClusterState, LabelSelector, StateError, selector_matches};
use crate::crd::{
    VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceMigration, VirtualMachineRestore,
    VirtualMachineSnapshot, VirtualMachineSnapshotContent,
};

/// Cluster state holding a fixed set of objects.
#[derive(Clone, Debug, Default)]
pub struct StaticClusterState {
    vms: Vec<VirtualMachine>,
    vmis: Vec<VirtualMachineInstance>,
    migrations: Vec<VirtualMachineInstanceMigration>,
    snapshots: Vec<VirtualMachineSnapshot>,
    snapshot_contents: Vec<VirtualMachineSnapshotContent>,
    restores: Vec<VirtualMachineRestore>,
    failure: Option<String>,
}

fn find<K: ResourceExt + Clone>(objects: &[K], namespace: &str, name: &str) -> Option<K> {
    objects
        .iter()
        .find(|o| o.namespace().as_deref() == Some(namespace) && o.name_any() == name)
        .cloned()
}

impl StaticClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose every lookup fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_vm(mut self, vm: VirtualMachine) -> Self {
        self.vms.push(vm);
        self
    }

    pub fn with_vmi(mut self, vmi: VirtualMachineInstance) -> Self {
        self.vmis.push(vmi);
        self
    }

    pub fn with_migration(mut self, migration: VirtualMachineInstanceMigration) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn with_snapshot(mut self, snapshot: VirtualMachineSnapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    pub fn with_snapshot_content(mut self, content: VirtualMachineSnapshotContent) -> Self {
        self.snapshot_contents.push(content);
        self
    }

    pub fn with_restore(mut self, restore: VirtualMachineRestore) -> Self {
        self.restores.push(restore);
        self
    }

    fn check(&self) -> Result<(), StateError> {
        match &self.failure {
            Some(message) => Err(StateError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

impl ClusterState for StaticClusterState {
    fn get_vm(&self, namespace: &str, name: &str) -> Result<Option<VirtualMachine>, StateError> {
        self.check()?;
        Ok(find(&self.vms, namespace, name))
    }

    fn get_vmi(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StateError> {
        self.check()?;
        Ok(find(&self.vmis, namespace, name))
    }

    fn list_vmis(&self) -> Result<Vec<VirtualMachineInstance>, StateError> {
        self.check()?;
        Ok(self.vmis.clone())
    }

    fn list_migrations(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<VirtualMachineInstanceMigration>, StateError> {
        self.check()?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| m.namespace().as_deref() == Some(namespace))
            .filter(|m| selector_matches(selector, m.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }

    fn get_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshot>, StateError> {
        self.check()?;
        Ok(find(&self.snapshots, namespace, name))
    }

    fn get_snapshot_content(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshotContent>, StateError> {
        self.check()?;
        Ok(find(&self.snapshot_contents, namespace, name))
    }

    fn list_restores(&self, namespace: &str) -> Result<Vec<VirtualMachineRestore>, StateError> {
        self.check()?;
        Ok(self
            .restores
            .iter()
            .filter(|r| r.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}
