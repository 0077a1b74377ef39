//! Read-only view of cluster state consulted by the admission rules.
//!
//! Rules never talk to the API server directly. They go through the
//! [`ClusterState`] trait, backed in production by reflector caches
//! ([`ReflectorState`]) and in tests by fixed object sets
//! ([`StaticClusterState`]). A lookup of an absent object returns
//! `Ok(None)` or an empty list; `Err` is reserved for lookups that could not
//! be answered at all.

mod memory;
mod reflector;

pub use memory::StaticClusterState;
pub use reflector::ReflectorState;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::crd::{
    VirtualMachine, VirtualMachineInstance, VirtualMachineInstanceMigration, VirtualMachineRestore,
    VirtualMachineSnapshot, VirtualMachineSnapshotContent,
};

/// Equality-based label selector.
pub type LabelSelector = BTreeMap<String, String>;

/// Whether every selector entry is present with the same value.
pub fn selector_matches(
    selector: &LabelSelector,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.and_then(|l| l.get(key)) == Some(value))
}

/// Error type for cluster state lookups
#[derive(Error, Debug)]
pub enum StateError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A cache has not completed its initial sync
    #[error("cache for {0} is not synced")]
    NotSynced(&'static str),

    /// The backing store cannot answer lookups
    #[error("cluster state unavailable: {0}")]
    Unavailable(String),
}

/// Lookups the admission rules need.
pub trait ClusterState: Send + Sync {
    fn get_vm(&self, namespace: &str, name: &str) -> Result<Option<VirtualMachine>, StateError>;

    fn get_vmi(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StateError>;

    /// All instances in the cluster.
    fn list_vmis(&self) -> Result<Vec<VirtualMachineInstance>, StateError>;

    fn list_migrations(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<VirtualMachineInstanceMigration>, StateError>;

    fn get_snapshot(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshot>, StateError>;

    fn get_snapshot_content(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineSnapshotContent>, StateError>;

    fn list_restores(&self, namespace: &str) -> Result<Vec<VirtualMachineRestore>, StateError>;
}
