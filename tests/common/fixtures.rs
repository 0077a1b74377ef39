//! Test fixtures for admission requests and cluster objects.
//!
//! Request objects are built as raw JSON, the way they arrive in an
//! AdmissionReview. Objects placed in the cluster state are decoded into
//! their typed form from the same JSON.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

use virt_admission::config::ClusterConfig;
use virt_admission::state::StaticClusterState;
use virt_admission::webhooks::{
    AdmissionAttributes, Admitter, CrdSchemaValidator, Decision, GroupVersionResource,
    ResourceKind, UserIdentity,
};

pub const NAMESPACE: &str = "default";
pub const CONTROLLER: &str = "system:serviceaccount:kubevirt:kubevirt-controller";
pub const HANDLER: &str = "system:serviceaccount:kubevirt:kubevirt-handler";

/// Decode a JSON fixture into a typed object.
pub fn typed<K: DeserializeOwned>(value: Value) -> K {
    serde_json::from_value(value).expect("fixture decodes")
}

/// Load a YAML manifest from `tests/fixtures`.
pub fn manifest(file: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(file);
    let raw = std::fs::read_to_string(&path).expect("fixture file exists");
    serde_yaml::from_str(&raw).expect("fixture is valid YAML")
}

pub fn resource(kind: ResourceKind) -> GroupVersionResource {
    GroupVersionResource::new(kind.group(), "v1", kind.plural())
}

/// Builder for one admission request and the state it is judged against.
pub struct Admission {
    kind: ResourceKind,
    attrs: AdmissionAttributes,
    config: ClusterConfig,
    state: StaticClusterState,
}

impl Admission {
    pub fn create(kind: ResourceKind, object: Value) -> Self {
        Self::with_attrs(kind, AdmissionAttributes::create(resource(kind), object))
    }

    pub fn update(kind: ResourceKind, object: Value, old_object: Value) -> Self {
        Self::with_attrs(
            kind,
            AdmissionAttributes::update(resource(kind), object, old_object),
        )
    }

    fn with_attrs(kind: ResourceKind, attrs: AdmissionAttributes) -> Self {
        Self {
            kind,
            attrs: attrs.with_user(UserIdentity::new("alice")),
            config: ClusterConfig::default(),
            state: StaticClusterState::new(),
        }
    }

    pub fn user(mut self, user: UserIdentity) -> Self {
        self.attrs = self.attrs.with_user(user);
        self
    }

    pub fn config(mut self, config: ClusterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(mut self, state: StaticClusterState) -> Self {
        self.state = state;
        self
    }

    pub fn sub_resource(mut self, sub_resource: &str) -> Self {
        self.attrs = self.attrs.with_sub_resource(sub_resource);
        self
    }

    pub fn admit(self) -> Decision {
        let admitter = Admitter::new(Arc::new(CrdSchemaValidator::new()), Arc::new(self.state));
        admitter.admit(self.kind, &self.attrs, &self.config)
    }
}

fn metadata(name: &str) -> Value {
    json!({"name": name, "namespace": NAMESPACE})
}

pub fn flavor(profiles: &[(&str, bool)]) -> Value {
    let profiles: Vec<Value> = profiles
        .iter()
        .map(|(name, default)| json!({"name": name, "default": default}))
        .collect();
    json!({
        "apiVersion": "flavor.kubevirt.io/v1alpha1",
        "kind": "VirtualMachineFlavor",
        "metadata": metadata("flavor"),
        "spec": {"profiles": profiles}
    })
}

pub fn migration(name: &str, vmi: &str) -> Value {
    json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachineInstanceMigration",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": {"kubevirt.io/vmi-name": vmi}
        },
        "spec": {"vmiName": vmi}
    })
}

/// A running instance on `node` with a 128Mi memory request.
pub fn vmi(name: &str, node: &str) -> Value {
    json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachineInstance",
        "metadata": metadata(name),
        "spec": {
            "domain": {
                "resources": {"requests": {"memory": "128Mi"}},
                "devices": {}
            }
        },
        "status": {"nodeName": node, "phase": "Running"}
    })
}

pub fn vm(name: &str) -> Value {
    json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachine",
        "metadata": metadata(name),
        "spec": {
            "runStrategy": "Halted",
            "template": {
                "spec": {
                    "domain": {
                        "resources": {"requests": {"memory": "128Mi"}},
                        "devices": {}
                    }
                }
            }
        }
    })
}

pub fn reference(group: &str, kind: &str, name: &str) -> Value {
    json!({"apiGroup": group, "kind": kind, "name": name})
}

pub fn clone(source: Value, target: Value) -> Value {
    json!({
        "apiVersion": "clone.kubevirt.io/v1beta1",
        "kind": "VirtualMachineClone",
        "metadata": metadata("clone"),
        "spec": {"source": source, "target": target}
    })
}
