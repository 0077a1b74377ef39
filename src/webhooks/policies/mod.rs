//! Per-kind validation policies.
//!
//! Each policy module exposes `validate` functions taking a
//! [`ValidationContext`] and returning the causes found, plus any warnings
//! for an otherwise allowed request. Policies append causes in a fixed order
//! so identical input always yields identical messages.
//!
//! Shared rule sets:
//! - `instance_spec`: guest hardware rules used by VM, VMI and hotplug
//! - `network`: interface and network rules called from `instance_spec`
//! - `volume_requests`: simulate-then-validate for pending hotplug requests
//! - `node_restriction`: ownership check for the per-node handler
//! - `immutability`: spec equality on update

pub mod clone;
pub mod export;
pub mod immutability;
pub mod instance_create;
pub mod instance_spec;
pub mod instance_update;
pub mod instancetype;
pub mod kubevirt;
pub mod migration;
pub mod migration_policy;
pub mod network;
pub mod node_restriction;
pub mod restore;
pub mod snapshot;
pub mod virtual_machine;
pub mod volume_requests;

use crate::config::{ClusterConfig, FeatureGate};
use crate::state::ClusterState;
use crate::webhooks::cause::Cause;
use crate::webhooks::error::{Error, Result};
use crate::webhooks::request::AdmissionAttributes;

/// Result of a validation check
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationResult {
    /// Rule violations, in evaluation order
    pub causes: Vec<Cause>,
    /// Non-blocking messages for an allowed request
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self::default()
    }

    /// Create a denied result
    pub fn denied(causes: Vec<Cause>) -> Self {
        Self {
            causes,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.causes.is_empty()
    }
}

impl From<Vec<Cause>> for ValidationResult {
    fn from(causes: Vec<Cause>) -> Self {
        Self::denied(causes)
    }
}

/// Context for validation
pub struct ValidationContext<'a, K> {
    /// The resource being validated
    pub resource: &'a K,
    /// The old resource (for UPDATE operations)
    pub old_resource: Option<&'a K>,
    /// The request the resource arrived in
    pub request: &'a AdmissionAttributes,
    /// Configuration snapshot for this request
    pub config: &'a ClusterConfig,
    /// Read-only cluster lookups
    pub state: &'a dyn ClusterState,
}

impl<K> ValidationContext<'_, K> {
    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.old_resource.is_some()
    }

    /// Namespace of the request
    pub fn namespace(&self) -> &str {
        &self.request.namespace
    }

    pub fn username(&self) -> &str {
        &self.request.user.username
    }

    /// Whether the caller is one of the virtualization service accounts.
    pub fn is_internal_user(&self) -> bool {
        self.config.is_internal_user(self.username())
    }

    /// Fail the request unless `gate` is enabled.
    pub fn require_gate(&self, gate: FeatureGate) -> Result<()> {
        if self.config.is_enabled(gate) {
            Ok(())
        } else {
            Err(Error::gate_disabled(gate))
        }
    }
}

/// Validator entry point for one kind and operation.
pub type Validator<K> = fn(&ValidationContext<'_, K>) -> Result<ValidationResult>;

/// Validator that accepts everything.
pub fn allow_all<K>(_ctx: &ValidationContext<'_, K>) -> Result<ValidationResult> {
    Ok(ValidationResult::allowed())
}
