//! Cluster state backed by kube reflector caches.

use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{ClusterState, LabelSelector, StateError, selector_matches};
use crate::config::{ClusterConfig, ConfigSource};
use crate::crd::{
    KubeVirt, VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceMigration,
    VirtualMachineRestore, VirtualMachineSnapshot, VirtualMachineSnapshotContent,
};

/// Create the default watcher configuration for all caches.
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Start a cluster-wide reflector for `K` and return its store.
///
/// The watch loop runs on a background task with the default backoff and
/// keeps the store current until the process exits.
fn spawn_store<K>(client: &Client, kind: &'static str) -> Store<K>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let api: Api<K> = Api::all(client.clone());
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, default_watcher_config()))
        .default_backoff()
        .touched_objects();
    tokio::spawn(async move {
        stream
            .for_each(|event| {
                if let Err(e) = event {
                    warn!(kind, error = %e, "Watch error, retrying");
                }
                futures::future::ready(())
            })
            .await;
        warn!(kind, "Watch stream ended");
    });
    debug!(kind, "Started reflector");
    reader
}

fn owned<K: Clone>(object: Arc<K>) -> K {
    Arc::unwrap_or_clone(object)
}

fn lookup<K>(store: &Store<K>, namespace: &str, name: &str) -> Option<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    store
        .get(&ObjectRef::new(name).within(namespace))
        .map(owned)
}

fn in_namespace<K>(store: &Store<K>, namespace: &str) -> Vec<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    store
        .state()
        .into_iter()
        .filter(|obj| obj.namespace().as_deref() == Some(namespace))
        .map(owned)
        .collect()
}

/// Cluster state read from informer caches.
#[derive(Clone)]
pub struct ReflectorState {
    vms: Store<VirtualMachine>,
    vmis: Store<VirtualMachineInstance>,
    migrations: Store<VirtualMachineInstanceMigration>,
    snapshots: Store<VirtualMachineSnapshot>,
    snapshot_contents: Store<VirtualMachineSnapshotContent>,
    restores: Store<VirtualMachineRestore>,
    kubevirts: Store<KubeVirt>,
    install_namespace: String,
}

impl ReflectorState {
    /// Start watching every resource the admission rules read.
    pub fn spawn(client: &Client, install_namespace: &str) -> Self {
        info!("Starting cluster state caches");
        Self {
            vms: spawn_store(client, "VirtualMachine"),
            vmis: spawn_store(client, "VirtualMachineInstance"),
            migrations: spawn_store(client, "VirtualMachineInstanceMigration"),
            snapshots: spawn_store(client, "VirtualMachineSnapshot"),
            snapshot_contents: spawn_store(client, "VirtualMachineSnapshotContent"),
            restores: spawn_store(client, "VirtualMachineRestore"),
            kubevirts: spawn_store(client, "KubeVirt"),
            install_namespace: install_namespace.to_string(),
        }
    }

    /// Wait for every cache to complete its initial list.
    pub async fn wait_until_ready(&self) -> Result<(), StateError> {
        self.vms
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachine"))?;
        self.vmis
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachineInstance"))?;
        self.migrations
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachineInstanceMigration"))?;
        self.snapshots
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachineSnapshot"))?;
        self.snapshot_contents
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachineSnapshotContent"))?;
        self.restores
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("VirtualMachineRestore"))?;
        self.kubevirts
            .wait_until_ready()
            .await
            .map_err(|_| StateError::NotSynced("KubeVirt"))?;
        info!("Cluster state caches synced");
        Ok(())
    }
}

impl ConfigSource for ReflectorState {
    /// Configuration from the KubeVirt CR in the install namespace, or the
    /// defaults when none exists yet.
    fn cluster_config(&self) -> ClusterConfig {
        let installed = self
            .kubevirts
            .state()
            .into_iter()
            .find(|kv| kv.namespace().as_deref() == Some(self.install_namespace.as_str()));
        match installed {
            Some(kv) => ClusterConfig::from_kubevirt(&kv, &self.install_namespace),
            None => ClusterConfig::default().with_install_namespace(&self.install_namespace),
        }
    }
}

impl ClusterState for ReflectorState {
    fn get_vm(&self, namespace: &str, name: &str) -> Result<Option<VirtualMachine>, StateError> {
        Ok(lookup(&self.vms, namespace, name))
    }

    fn get_vmi(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StateError> {
        Ok(lookup(&self.vmis, namespace, name))
    }

    fn list_vmis(&self) -> Result<Vec<VirtualMachineInstance>, StateError> {
        Ok(self.vmis.state().into_iter().map(owned).collect())
    }

    fn list_migrations(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<VirtualMachineInstanceMigration>, StateError> {
        Ok(in_namespace(&self.migrations, namespace)
            .into_iter()
            .filter(|m| selector_matches(selector, m.metadata.labels.as_ref()))
            .collect())
    }

    fn get_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshot>, StateError> {
        Ok(lookup(&self.snapshots, namespace, name))
    }

    fn get_snapshot_content(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshotContent>, StateError> {
        Ok(lookup(&self.snapshot_contents, namespace, name))
    }

    fn list_restores(&self, namespace: &str) -> Result<Vec<VirtualMachineRestore>, StateError> {
        Ok(in_namespace(&self.restores, namespace))
    }
}
