//! Process and cluster configuration.
//!
//! Process settings come from the environment once at startup. Cluster
//! settings live in the KubeVirt CR and are re-read into a [`ClusterConfig`]
//! for every admission request, so a single request never observes a
//! mixture of two configurations.

use std::collections::BTreeSet;

use tracing::debug;

use crate::crd::KubeVirt;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;
/// Namespace the virtualization components are installed in
pub const DEFAULT_INSTALL_NAMESPACE: &str = "kubevirt";

/// Default cap on inline cloud-init user data.
pub const DEFAULT_MAX_CLOUD_INIT_USER_DATA_BYTES: usize = 2048;
/// Memory hotplug granularity.
pub const DEFAULT_MEMORY_HOTPLUG_BLOCK_ALIGNMENT: i64 = 2 * 1024 * 1024;
pub const DEFAULT_ARCHITECTURE: &str = "amd64";

/// Settings read from the environment at startup.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: String,
    pub key_path: String,
    pub install_namespace: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            install_namespace: DEFAULT_INSTALL_NAMESPACE.to_string(),
        }
    }
}

impl ProcessConfig {
    /// Read overrides from `WEBHOOK_PORT`, `HEALTH_PORT`, `WEBHOOK_CERT_PATH`,
    /// `WEBHOOK_KEY_PATH` and `KUBEVIRT_NAMESPACE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable ports keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = |key: &str, default: u16| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            webhook_port: port("WEBHOOK_PORT", defaults.webhook_port),
            health_port: port("HEALTH_PORT", defaults.health_port),
            cert_path: lookup("WEBHOOK_CERT_PATH").unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH").unwrap_or(defaults.key_path),
            install_namespace: lookup("KUBEVIRT_NAMESPACE").unwrap_or(defaults.install_namespace),
        }
    }
}

/// Feature gates consulted by the admission rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureGate {
    Snapshot,
    LiveMigration,
    HostDisk,
    MultiArchitecture,
    NodeRestriction,
    DecentralizedLiveMigration,
    WorkloadEncryptionSev,
    VmExport,
    Macvtap,
    Passt,
    NetworkBindingPlugins,
}

impl FeatureGate {
    pub const ALL: [FeatureGate; 11] = [
        FeatureGate::Snapshot,
        FeatureGate::LiveMigration,
        FeatureGate::HostDisk,
        FeatureGate::MultiArchitecture,
        FeatureGate::NodeRestriction,
        FeatureGate::DecentralizedLiveMigration,
        FeatureGate::WorkloadEncryptionSev,
        FeatureGate::VmExport,
        FeatureGate::Macvtap,
        FeatureGate::Passt,
        FeatureGate::NetworkBindingPlugins,
    ];

    /// Name used in the KubeVirt CR's feature gate list.
    pub const fn name(self) -> &'static str {
        match self {
            FeatureGate::Snapshot => "Snapshot",
            FeatureGate::LiveMigration => "LiveMigration",
            FeatureGate::HostDisk => "HostDisk",
            FeatureGate::MultiArchitecture => "MultiArchitecture",
            FeatureGate::NodeRestriction => "NodeRestriction",
            FeatureGate::DecentralizedLiveMigration => "DecentralizedLiveMigration",
            FeatureGate::WorkloadEncryptionSev => "WorkloadEncryptionSEV",
            FeatureGate::VmExport => "VMExport",
            FeatureGate::Macvtap => "Macvtap",
            FeatureGate::Passt => "Passt",
            FeatureGate::NetworkBindingPlugins => "NetworkBindingPlugins",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|gate| gate.name() == name)
    }
}

/// Cluster-wide configuration snapshot used for one admission request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    pub(crate) feature_gates: BTreeSet<FeatureGate>,
    pub max_cloud_init_user_data_bytes: usize,
    pub memory_hotplug_block_alignment: i64,
    pub default_architecture: String,
    /// Namespace of the virtualization service accounts.
    pub install_namespace: String,
    /// Whether bridge binding may be used on the pod network.
    pub permit_bridge_interface_on_pod_network: bool,
    pub permit_slirp_interface: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            feature_gates: BTreeSet::new(),
            max_cloud_init_user_data_bytes: DEFAULT_MAX_CLOUD_INIT_USER_DATA_BYTES,
            memory_hotplug_block_alignment: DEFAULT_MEMORY_HOTPLUG_BLOCK_ALIGNMENT,
            default_architecture: DEFAULT_ARCHITECTURE.to_string(),
            install_namespace: DEFAULT_INSTALL_NAMESPACE.to_string(),
            permit_bridge_interface_on_pod_network: true,
            permit_slirp_interface: false,
        }
    }
}

impl ClusterConfig {
    /// Read gates and defaults from the KubeVirt CR.
    ///
    /// Unknown gate names are ignored.
    pub fn from_kubevirt(kubevirt: &KubeVirt, install_namespace: &str) -> Self {
        let mut config = Self {
            install_namespace: install_namespace.to_string(),
            ..Self::default()
        };
        for name in kubevirt.feature_gates() {
            match FeatureGate::from_name(name) {
                Some(gate) => {
                    config.feature_gates.insert(gate);
                }
                None => debug!(gate = %name, "Ignoring unknown feature gate"),
            }
        }
        if let Some(arch) = kubevirt
            .spec
            .configuration
            .architecture_configuration
            .as_ref()
            .and_then(|a| a.default_architecture.as_deref())
        {
            config.default_architecture = arch.to_string();
        }
        if let Some(network) = kubevirt.network_configuration() {
            if let Some(permit) = network.permit_bridge_interface_on_pod_network {
                config.permit_bridge_interface_on_pod_network = permit;
            }
            if let Some(permit) = network.permit_slirp_interface {
                config.permit_slirp_interface = permit;
            }
        }
        config
    }

    pub fn with_gate(mut self, gate: FeatureGate) -> Self {
        self.feature_gates.insert(gate);
        self
    }

    pub fn with_install_namespace(mut self, namespace: &str) -> Self {
        self.install_namespace = namespace.to_string();
        self
    }

    pub fn is_enabled(&self, gate: FeatureGate) -> bool {
        self.feature_gates.contains(&gate)
    }

    pub fn enabled_gates(&self) -> impl Iterator<Item = FeatureGate> + '_ {
        self.feature_gates.iter().copied()
    }

    fn service_account(&self, name: &str) -> String {
        format!("system:serviceaccount:{}:{name}", self.install_namespace)
    }

    /// Username of the per-node handler.
    pub fn handler_user(&self) -> String {
        self.service_account("kubevirt-handler")
    }

    /// Whether `username` is one of the virtualization service accounts.
    pub fn is_internal_user(&self, username: &str) -> bool {
        [
            "kubevirt-controller",
            "kubevirt-handler",
            "kubevirt-apiserver",
            "kubevirt-operator",
        ]
        .iter()
        .any(|sa| self.service_account(sa) == username)
    }
}

/// Source of the configuration snapshot taken for each request.
pub trait ConfigSource: Send + Sync {
    fn cluster_config(&self) -> ClusterConfig;
}

impl ConfigSource for ClusterConfig {
    fn cluster_config(&self) -> ClusterConfig {
        self.clone()
    }
}
