//! Node ownership check for the per-node handler.
//!
//! When the NodeRestriction gate is on, a handler token bound to a node may
//! only modify instances scheduled on that node, or taking part in a
//! migration to or from it.

use crate::config::{ClusterConfig, FeatureGate};
use crate::crd::VirtualMachineInstance;
use crate::webhooks::cause::Cause;
use crate::webhooks::request::UserIdentity;

pub const NODE_RESTRICTION_MESSAGE: &str =
    "Node restriction, virt-handler is only allowed to modify VMIs it owns";

/// Deny a handler update for an instance owned by another node.
pub fn validate(
    old: &VirtualMachineInstance,
    user: &UserIdentity,
    config: &ClusterConfig,
) -> Vec<Cause> {
    let restricted = config.is_enabled(FeatureGate::NodeRestriction)
        && user.username == config.handler_user();
    if !restricted {
        return Vec::new();
    }
    let Some(node) = user.node_name() else {
        return Vec::new();
    };
    if owning_nodes(old).any(|owner| owner == node) {
        Vec::new()
    } else {
        vec![Cause::invalid("status.nodeName", NODE_RESTRICTION_MESSAGE)]
    }
}

/// Nodes allowed to act on `vmi`: where it runs, plus both ends of an
/// in-flight migration.
fn owning_nodes(vmi: &VirtualMachineInstance) -> impl Iterator<Item = &str> {
    let migration = vmi.migration_state().filter(|_| vmi.is_migrating());
    vmi.node_name()
        .into_iter()
        .chain(migration.and_then(|m| m.source_node.as_deref()))
        .chain(migration.and_then(|m| m.target_node.as_deref()))
}
