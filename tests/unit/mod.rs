// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for virt-admission.
//!
//! These tests run without a Kubernetes cluster and exercise the public
//! building blocks in isolation.

mod config_tests {
    use std::collections::HashMap;

    use serde_json::json;
    use virt_admission::config::{
        ClusterConfig, ConfigSource, FeatureGate, HEALTH_PORT, ProcessConfig, WEBHOOK_PORT,
    };
    use virt_admission::crd::KubeVirt;

    #[test]
    fn test_process_config_defaults() {
        let config = ProcessConfig::from_lookup(|_| None);
        assert_eq!(config.webhook_port, WEBHOOK_PORT);
        assert_eq!(config.health_port, HEALTH_PORT);
        assert_eq!(config.install_namespace, "kubevirt");
    }

    #[test]
    fn test_process_config_overrides() {
        let env = HashMap::from([
            ("WEBHOOK_PORT", "8443"),
            ("HEALTH_PORT", "not-a-port"),
            ("KUBEVIRT_NAMESPACE", "virt"),
        ]);
        let config = ProcessConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.webhook_port, 8443);
        assert_eq!(config.health_port, HEALTH_PORT);
        assert_eq!(config.install_namespace, "virt");
    }

    #[test]
    fn test_gate_names_round_trip() {
        for gate in FeatureGate::ALL {
            assert_eq!(FeatureGate::from_name(gate.name()), Some(gate));
        }
        assert_eq!(FeatureGate::from_name("NoSuchGate"), None);
    }

    #[test]
    fn test_cluster_config_from_kubevirt() {
        let kubevirt: KubeVirt = serde_json::from_value(json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "KubeVirt",
            "metadata": {"name": "kubevirt", "namespace": "virt"},
            "spec": {
                "configuration": {
                    "developerConfiguration": {"featureGates": ["Snapshot", "Unknown"]},
                    "architectureConfiguration": {"defaultArchitecture": "arm64"}
                }
            }
        }))
        .unwrap();

        let config = ClusterConfig::from_kubevirt(&kubevirt, "virt");
        assert!(config.is_enabled(FeatureGate::Snapshot));
        assert!(!config.is_enabled(FeatureGate::LiveMigration));
        assert_eq!(config.enabled_gates().count(), 1);
        assert_eq!(config.default_architecture, "arm64");
        assert_eq!(config.handler_user(), "system:serviceaccount:virt:kubevirt-handler");
        assert_eq!(config.cluster_config(), config);
    }

    #[test]
    fn test_internal_users_follow_install_namespace() {
        let config = ClusterConfig::default().with_install_namespace("virt");
        assert!(config.is_internal_user("system:serviceaccount:virt:kubevirt-controller"));
        assert!(!config.is_internal_user("system:serviceaccount:kubevirt:kubevirt-controller"));
        assert!(!config.is_internal_user("alice"));
    }
}

mod quantity_tests {
    use virt_admission::crd::quantity::{format_binary, parse_quantity};

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_quantity("128Mi"), Some(128 * 1024 * 1024));
        assert_eq!(parse_quantity("1G"), Some(1_000_000_000));
        assert_eq!(parse_quantity("1.5Ki"), Some(1536));
        assert_eq!(parse_quantity("-2k"), Some(-2000));
        assert_eq!(parse_quantity("1500m"), Some(2));
    }

    #[test]
    fn test_parse_rounds_up_and_scales_by_exponent() {
        assert_eq!(parse_quantity("1m"), Some(1));
        assert_eq!(parse_quantity("0.5"), Some(1));
        assert_eq!(parse_quantity("2e9"), Some(2_000_000_000));
        assert_eq!(parse_quantity("64E6"), Some(64_000_000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("12Mb"), None);
        assert_eq!(parse_quantity("Mi"), None);
        assert_eq!(parse_quantity("9Ei"), None);
    }

    #[test]
    fn test_format_binary() {
        assert_eq!(format_binary(2 * 1024 * 1024), "2Mi");
    }
}

mod kind_tests {
    use virt_admission::webhooks::ResourceKind;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(
            ResourceKind::Migration.endpoint(),
            "/validate-virtualmachineinstancemigrations"
        );
        assert_eq!(
            ResourceKind::Restore.group_resource(),
            "snapshot.kubevirt.io/virtualmachinerestores"
        );
    }

    #[test]
    fn test_generated_definitions_match_kinds() {
        for kind in ResourceKind::ALL {
            let crd = kind.crd();
            assert_eq!(crd.spec.group, kind.group(), "{kind}");
            assert_eq!(crd.spec.names.plural, kind.plural(), "{kind}");
            assert_eq!(crd.spec.names.kind, kind.kind(), "{kind}");
        }
    }
}

mod decision_tests {
    use virt_admission::webhooks::{Cause, Decision, FieldPath};

    #[test]
    fn test_causes_render_in_order() {
        let volumes = FieldPath::new("spec.template.spec").child("volumes");
        let decision = Decision::deny(vec![
            Cause::duplicate(volumes.index(1).child("name"), "duplicate volume name"),
            Cause::required(volumes.index(2).child("name"), "name is required"),
        ]);
        assert_eq!(decision.message, "duplicate volume name, name is required");
        assert_eq!(decision.causes[0].field, "spec.template.spec.volumes[1].name");
        assert_eq!(decision.http_status(), 200);
    }
}

mod clone_grammar_tests {
    use virt_admission::webhooks::policies::clone::{is_valid_filter, is_valid_mac};

    #[test]
    fn test_filters() {
        for valid in ["*", "!x", "x*", "x", "app.kubernetes.io/*"] {
            assert!(is_valid_filter(valid), "{valid}");
        }
        for invalid in ["!", "a/!b", "a!", "*a", "a*b", "!a*"] {
            assert!(!is_valid_filter(invalid), "{invalid}");
        }
    }

    #[test]
    fn test_mac_addresses() {
        assert!(is_valid_mac("02:00:00:aa:BB:cc"));
        assert!(is_valid_mac("02:00:00:00:00:00:00:01"));
        assert!(!is_valid_mac("02-00-00-00-00-00"));
        assert!(!is_valid_mac("02:00:00:00:00"));
    }
}
