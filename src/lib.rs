//! virt-admission library crate
//!
//! Validating admission engine for KubeVirt resources: typed resource
//! definitions, cluster configuration, read-only cluster state, the
//! admission rules and the servers that expose them.

pub mod config;
pub mod crd;
pub mod health;
pub mod state;
pub mod webhooks;

pub use config::{ClusterConfig, ConfigSource, FeatureGate, ProcessConfig};
pub use health::HealthState;
pub use state::{ClusterState, ReflectorState, StaticClusterState};
pub use webhooks::{Admitter, Decision, WebhookError, WebhookState, run_webhook_server};
