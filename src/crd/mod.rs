//! Typed KubeVirt resources validated by the admission webhooks.
//!
//! - `VirtualMachine` / `VirtualMachineInstance`: the machines themselves
//! - `VirtualMachineInstanceMigration` / `MigrationPolicy`: live migration
//! - Flavors, instancetypes and preferences: reusable guest shapes
//! - Snapshots, restores, clones and exports: data management
//! - `KubeVirt`: the installation and its cluster-wide configuration

mod clone;
mod export;
mod instance;
mod instancetype;
mod kubevirt;
mod migration;
pub mod quantity;
mod snapshot;
mod virtual_machine;

pub use clone::*;
pub use export::*;
pub use instance::*;
pub use instancetype::*;
pub use kubevirt::*;
pub use migration::*;
pub use snapshot::*;
pub use virtual_machine::*;

use std::collections::BTreeMap;

/// API group of the core virtualization resources.
pub const CORE_GROUP: &str = "kubevirt.io";
pub const SNAPSHOT_GROUP: &str = "snapshot.kubevirt.io";
pub const CLONE_GROUP: &str = "clone.kubevirt.io";
pub const EXPORT_GROUP: &str = "export.kubevirt.io";
pub const FLAVOR_GROUP: &str = "flavor.kubevirt.io";
pub const INSTANCETYPE_GROUP: &str = "instancetype.kubevirt.io";
pub const MIGRATIONS_GROUP: &str = "migrations.kubevirt.io";

/// Labels only the virtualization components may set on an instance.
pub const RESERVED_LABELS: [&str; 6] = [
    "kubevirt.io/created-by",
    "kubevirt.io/migrationJobUID",
    "kubevirt.io/nodeName",
    "kubevirt.io/migrationTargetNodeName",
    "kubevirt.io/schedulable",
    "kubevirt.io/install-strategy",
];

/// Fields of an open object that the webhooks do not inspect.
///
/// Flattened into a struct, kube renders the schema with
/// `x-kubernetes-preserve-unknown-fields` so the structural check keeps
/// validating the modelled properties and passes everything else through.
pub type Unmodelled = BTreeMap<String, serde_json::Value>;
