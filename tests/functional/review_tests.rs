//! AdmissionReview round trips through the webhook handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use kube::core::DynamicObject;
use serde_json::{Value, json};

use virt_admission::config::{ClusterConfig, FeatureGate};
use virt_admission::health::HealthState;
use virt_admission::state::StaticClusterState;
use virt_admission::webhooks::request::NODE_NAME_CLAIM;
use virt_admission::webhooks::{
    AdmissionReview, Admitter, CrdSchemaValidator, ResourceKind, WebhookState, handle_review,
};

use crate::common::fixtures::{HANDLER, flavor, vm, vmi};

fn webhook(config: ClusterConfig) -> WebhookState {
    WebhookState::new(
        Admitter::new(
            Arc::new(CrdSchemaValidator::new()),
            Arc::new(StaticClusterState::new()),
        ),
        Arc::new(config),
        Arc::new(HealthState::new()),
    )
}

fn review(
    kind: ResourceKind,
    operation: &str,
    sub_resource: Option<&str>,
    object: Value,
    old_object: Option<Value>,
) -> AdmissionReview<DynamicObject> {
    let mut request = json!({
        "uid": "b6a2b0a1-0c1e-4d42-9a55-2a1f2b3c4d5e",
        "kind": {"group": kind.group(), "version": "v1", "kind": kind.kind()},
        "resource": {"group": kind.group(), "version": "v1", "resource": kind.plural()},
        "name": object["metadata"]["name"],
        "namespace": "default",
        "operation": operation,
        "userInfo": {"username": "alice"},
        "object": object,
        "dryRun": false
    });
    if let Some(sub_resource) = sub_resource {
        request["subResource"] = json!(sub_resource);
    }
    if let Some(old_object) = old_object {
        request["oldObject"] = old_object;
    }
    serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request
    }))
    .unwrap()
}

#[test]
fn test_denied_review_carries_structured_causes() {
    let state = webhook(ClusterConfig::default());
    let (status, axum::Json(review)) = handle_review(
        &state,
        ResourceKind::Flavor,
        review(
            ResourceKind::Flavor,
            "CREATE",
            None,
            flavor(&[("a", true), ("b", true)]),
            None,
        ),
    );

    assert_eq!(status, StatusCode::OK);
    let response = review.response.unwrap();
    assert!(!response.allowed);
    assert_eq!(response.uid, "b6a2b0a1-0c1e-4d42-9a55-2a1f2b3c4d5e");
    assert_eq!(response.result.code, 400);
    let causes = response.result.details.unwrap().causes;
    assert_eq!(causes.len(), 1);
    assert_eq!(causes[0].reason, "FieldValueNotSupported");
    assert_eq!(causes[0].field, "spec.profiles");
}

#[test]
fn test_allowed_review_carries_warnings() {
    let mut machine = vm("vm");
    let spec = machine["spec"].as_object_mut().unwrap();
    spec.remove("runStrategy");
    spec.insert("running".to_string(), json!(true));

    let state = webhook(ClusterConfig::default());
    let (status, axum::Json(review)) = handle_review(
        &state,
        ResourceKind::VirtualMachine,
        review(ResourceKind::VirtualMachine, "CREATE", None, machine, None),
    );

    assert_eq!(status, StatusCode::OK);
    let response = review.response.unwrap();
    assert!(response.allowed);
    assert_eq!(response.warnings.unwrap().len(), 1);
}

#[test]
fn test_status_update_skips_spec_rules() {
    // No template: the main validator would reject this, the status one does not.
    let mut machine = vm("vm");
    machine["spec"].as_object_mut().unwrap().remove("template");

    let state = webhook(ClusterConfig::default());
    let (_, axum::Json(main)) = handle_review(
        &state,
        ResourceKind::VirtualMachine,
        review(
            ResourceKind::VirtualMachine,
            "UPDATE",
            None,
            machine.clone(),
            Some(machine.clone()),
        ),
    );
    assert!(!main.response.unwrap().allowed);

    let (_, axum::Json(status)) = handle_review(
        &state,
        ResourceKind::VirtualMachine,
        review(
            ResourceKind::VirtualMachine,
            "UPDATE",
            Some("status"),
            machine.clone(),
            Some(machine),
        ),
    );
    assert!(status.response.unwrap().allowed);
}

#[test]
fn test_update_without_old_object_is_bad_request() {
    let state = webhook(ClusterConfig::default().with_gate(FeatureGate::Snapshot));
    let snapshot = json!({
        "apiVersion": "snapshot.kubevirt.io/v1beta1",
        "kind": "VirtualMachineSnapshot",
        "metadata": {"name": "snap", "namespace": "default"},
        "spec": {"source": {"apiGroup": "kubevirt.io", "kind": "VirtualMachine", "name": "vm"}}
    });
    let (status, axum::Json(review)) = handle_review(
        &state,
        ResourceKind::Snapshot,
        review(ResourceKind::Snapshot, "UPDATE", None, snapshot, None),
    );

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let response = review.response.unwrap();
    assert!(!response.allowed);
    assert!(response.result.details.is_none());
}

#[test]
fn test_decisions_are_counted() {
    let state = webhook(ClusterConfig::default());
    for _ in 0..2 {
        let _ = handle_review(
            &state,
            ResourceKind::Flavor,
            review(
                ResourceKind::Flavor,
                "CREATE",
                None,
                flavor(&[("a", true)]),
                None,
            ),
        );
    }
    let metrics = state.health.metrics.encode();
    let series = r#"kind="VirtualMachineFlavor",operation="CREATE",allowed="true"} 2"#;
    assert!(metrics.contains(series));
}

#[test]
fn test_handler_token_bound_to_first_listed_node() {
    let state = webhook(ClusterConfig::default().with_gate(FeatureGate::NodeRestriction));
    let old = vmi("testvmi", "node01");
    let mut new = old.clone();
    new["metadata"]["annotations"] = json!({"example.com/touched": "true"});

    let signed_by = |nodes: &[&str]| {
        let mut rev = review(
            ResourceKind::VirtualMachineInstance,
            "UPDATE",
            None,
            new.clone(),
            Some(old.clone()),
        );
        let request = rev.request.as_mut().unwrap();
        request.user_info.username = Some(HANDLER.to_string());
        request.user_info.extra = Some(BTreeMap::from([(
            NODE_NAME_CLAIM.to_string(),
            nodes.iter().map(|n| n.to_string()).collect(),
        )]));
        rev
    };

    let (_, axum::Json(denied)) = handle_review(
        &state,
        ResourceKind::VirtualMachineInstance,
        signed_by(&["node02", "node01"]),
    );
    let response = denied.response.unwrap();
    assert!(!response.allowed);
    assert_eq!(
        response.result.message,
        "Node restriction, virt-handler is only allowed to modify VMIs it owns"
    );

    let (_, axum::Json(allowed)) = handle_review(
        &state,
        ResourceKind::VirtualMachineInstance,
        signed_by(&["node01", "node02"]),
    );
    assert!(allowed.response.unwrap().allowed);
}
