//! VirtualMachineClone validation policy.
//!
//! Checks the source and target references, the label and annotation
//! filters, replacement MAC addresses and the custom JSON patches.

use std::sync::LazyLock;

use regex::Regex;

use super::snapshot::validate_vm_reference;
use super::{ValidationContext, ValidationResult};
use crate::config::FeatureGate;
use crate::crd::{CORE_GROUP, SNAPSHOT_GROUP, TypedObjectReference, VirtualMachineClone};
use crate::webhooks::cause::{Cause, FieldPath};
use crate::webhooks::error::Result;

/// Kinds a clone may copy from, with the group each must carry.
const SOURCE_KINDS: [(&str, &str); 2] = [
    ("VirtualMachine", CORE_GROUP),
    ("VirtualMachineSnapshot", SNAPSHOT_GROUP),
];

const PATCH_OPS: [&str; 6] = ["add", "remove", "replace", "move", "copy", "test"];

static MAC_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}((:[0-9A-Fa-f]{2}){2})?$").ok()
});

/// Validate a clone create.
pub fn validate_create(
    ctx: &ValidationContext<'_, VirtualMachineClone>,
) -> Result<ValidationResult> {
    ctx.require_gate(FeatureGate::Snapshot)?;

    let spec = &ctx.resource.spec;
    let mut causes = Vec::new();

    match spec.source.as_ref() {
        None => causes.push(Cause::required("spec.source", "spec.source is a required field")),
        Some(source) => causes.extend(validate_source(&FieldPath::new("spec.source"), source)),
    }
    if let Some(target) = spec.target.as_ref() {
        causes.extend(validate_vm_reference(&FieldPath::new("spec.target"), target));
    }
    if let (Some(source), Some(target)) = (spec.source.as_ref(), spec.target.as_ref()) {
        let both_vms = source.kind == "VirtualMachine" && target.kind == "VirtualMachine";
        if both_vms && !source.name.is_empty() && source.name == target.name {
            causes.push(Cause::invalid(
                "spec.target.name",
                format!(
                    "Source and target VirtualMachine names must differ, both are {:?}",
                    source.name
                ),
            ));
        }
    }

    let filter_sets = [
        ("spec.labelFilters", &spec.label_filters),
        ("spec.annotationFilters", &spec.annotation_filters),
        ("spec.template.labelFilters", &spec.template.label_filters),
        ("spec.template.annotationFilters", &spec.template.annotation_filters),
    ];
    for (root, filters) in filter_sets {
        let path = FieldPath::new(root);
        for (idx, filter) in filters.iter().enumerate() {
            if !is_valid_filter(filter) {
                causes.push(Cause::invalid(
                    path.index(idx),
                    format!(
                        "{filter:?} is not a valid filter: '!' and '*' are only allowed as the \
                         first or last character"
                    ),
                ));
            }
        }
    }

    let macs = FieldPath::new("spec.newMacAddresses");
    for (interface, mac) in &spec.new_mac_addresses {
        if !is_valid_mac(mac) {
            causes.push(Cause::invalid(
                macs.key(interface),
                format!("{mac:?} is not a valid MAC address for interface {interface}"),
            ));
        }
    }

    let patches = FieldPath::new("spec.patches");
    for (idx, patch) in spec.patches.iter().enumerate() {
        if let Err(reason) = check_patch(patch) {
            causes.push(Cause::invalid(
                patches.index(idx),
                format!("invalid JSON patch {patch:?}: {reason}"),
            ));
        }
    }

    Ok(causes.into())
}

fn validate_source(path: &FieldPath, source: &TypedObjectReference) -> Vec<Cause> {
    let mut causes = Vec::new();
    let kind = path.child("kind");
    let group = path.child("apiGroup");

    match SOURCE_KINDS.iter().find(|(k, _)| *k == source.kind) {
        None => causes.push(Cause::not_supported(
            &kind,
            format!(
                "{kind} has invalid value {:?}, must be one of: VirtualMachine, \
                 VirtualMachineSnapshot",
                source.kind
            ),
        )),
        Some((_, expected)) => match source.api_group.as_deref() {
            None | Some("") => {
                causes.push(Cause::required(&group, format!("{group} is a required field")))
            }
            Some(actual) if actual != *expected => causes.push(Cause::not_supported(
                &group,
                format!("{group} has invalid value {actual}, must be {expected}"),
            )),
            Some(_) => {}
        },
    }

    if source.name.is_empty() {
        let name = path.child("name");
        causes.push(Cause::required(&name, format!("{name} is a required field")));
    }
    causes
}

/// Whether `filter` follows the filter grammar: `*`, a plain key, a key
/// negated with a leading `!`, or a prefix ending in `*`.
pub fn is_valid_filter(filter: &str) -> bool {
    let special = |s: &str| s.contains(['!', '*']);
    if filter == "*" {
        return true;
    }
    if let Some(rest) = filter.strip_prefix('!') {
        return !rest.is_empty() && !special(rest);
    }
    if let Some(prefix) = filter.strip_suffix('*') {
        return !special(prefix);
    }
    !special(filter)
}

/// Colon-separated hex octets, six (EUI-48) or eight (EUI-64) of them.
pub fn is_valid_mac(mac: &str) -> bool {
    MAC_RE.as_ref().is_some_and(|re| re.is_match(mac))
}

fn check_patch(raw: &str) -> std::result::Result<(), String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let Some(operation) = value.as_object() else {
        return Err("patch must be a JSON object".to_string());
    };

    let field = |name: &str| operation.get(name).and_then(serde_json::Value::as_str);
    let op = field("op").ok_or("missing \"op\"")?;
    if !PATCH_OPS.contains(&op) {
        return Err(format!("unsupported op {op:?}"));
    }
    let path = field("path").ok_or("missing \"path\"")?;
    if !path.is_empty() && !path.starts_with('/') {
        return Err(format!("path {path:?} must start with '/'"));
    }
    match op {
        "move" | "copy" if field("from").is_none() => Err(format!("{op} requires \"from\"")),
        "add" | "replace" | "test" if !operation.contains_key("value") => {
            Err(format!("{op} requires \"value\""))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::testing::run;
    use super::*;
    use crate::config::ClusterConfig;
    use crate::crd::VirtualMachineCloneSpec;
    use crate::state::StaticClusterState;
    use crate::webhooks::error::Error;

    fn vm_ref(name: &str) -> TypedObjectReference {
        TypedObjectReference::new("kubevirt.io", "VirtualMachine", name)
    }

    fn clone_of(source: TypedObjectReference, target: TypedObjectReference) -> VirtualMachineClone {
        VirtualMachineClone::new(
            "clone",
            VirtualMachineCloneSpec {
                source: Some(source),
                target: Some(target),
                ..Default::default()
            },
        )
    }

    fn check(clone: &VirtualMachineClone) -> ValidationResult {
        let config = ClusterConfig::default().with_gate(FeatureGate::Snapshot);
        run(validate_create, clone, None, &config, &StaticClusterState::new(), "alice").unwrap()
    }

    #[test]
    fn test_gate_required() {
        let clone = clone_of(vm_ref("a"), vm_ref("b"));
        let result = run(
            validate_create,
            &clone,
            None,
            &ClusterConfig::default(),
            &StaticClusterState::new(),
            "alice",
        );
        assert!(matches!(result, Err(Error::FeatureGateDisabled(_))));
    }

    #[test]
    fn test_same_vm_names_denied() {
        let result = check(&clone_of(vm_ref("vm"), vm_ref("vm")));
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field, "spec.target.name");

        let snapshot =
            TypedObjectReference::new("snapshot.kubevirt.io", "VirtualMachineSnapshot", "vm");
        assert!(check(&clone_of(snapshot, vm_ref("vm"))).is_allowed());
    }

    #[test]
    fn test_unsupported_kinds() {
        let source = TypedObjectReference::new("kubevirt.io", "VirtualMachineInstance", "vmi");
        let target =
            TypedObjectReference::new("snapshot.kubevirt.io", "VirtualMachineSnapshot", "snap");
        let result = check(&clone_of(source, target));
        let fields: Vec<&str> = result.causes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["spec.source.kind", "spec.target.apiGroup", "spec.target.kind"]
        );
    }

    #[test]
    fn test_source_group_must_match_kind() {
        let source = TypedObjectReference::new("kubevirt.io", "VirtualMachineSnapshot", "snap");
        let result = check(&clone_of(source, vm_ref("vm")));
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field, "spec.source.apiGroup");
    }

    #[test]
    fn test_missing_source() {
        let clone = VirtualMachineClone::new("clone", VirtualMachineCloneSpec::default());
        let result = check(&clone);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field, "spec.source");
    }

    #[test]
    fn test_filter_grammar() {
        for valid in ["*", "!x", "x*", "x", "kubevirt.io/*", "!team"] {
            assert!(is_valid_filter(valid), "{valid} should be valid");
        }
        for invalid in ["!", "a/!b", "a!", "*a", "a*b", "!a*", "**"] {
            assert!(!is_valid_filter(invalid), "{invalid} should be invalid");
        }
    }

    #[test]
    fn test_invalid_filter_reported_by_index() {
        let mut clone = clone_of(vm_ref("a"), vm_ref("b"));
        clone.spec.template.label_filters = vec!["*".to_string(), "a*b".to_string()];
        let result = check(&clone);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field, "spec.template.labelFilters[1]");
    }

    #[test]
    fn test_mac_addresses() {
        assert!(is_valid_mac("02:00:00:00:00:01"));
        assert!(is_valid_mac("02:00:00:ff:fe:00:00:01"));
        assert!(!is_valid_mac("02-00-00-00-00-01"));
        assert!(!is_valid_mac("02:00:00:00:00"));
        assert!(!is_valid_mac("02:00:00:00:00:0g"));

        let mut clone = clone_of(vm_ref("a"), vm_ref("b"));
        clone.spec.new_mac_addresses =
            BTreeMap::from([("eth0".to_string(), "not-a-mac".to_string())]);
        let result = check(&clone);
        assert_eq!(result.causes[0].field, "spec.newMacAddresses[eth0]");
    }

    #[test]
    fn test_patches() {
        assert!(check_patch(r#"{"op":"replace","path":"/spec/running","value":false}"#).is_ok());
        assert!(check_patch(r#"{"op":"remove","path":"/metadata/labels/a"}"#).is_ok());
        assert!(check_patch(r#"{"op":"copy","from":"/a","path":"/b"}"#).is_ok());
        assert!(check_patch("not json").is_err());
        assert!(check_patch(r#"{"op":"merge","path":"/a"}"#).is_err());
        assert!(check_patch(r#"{"op":"add","path":"/a"}"#).is_err());
        assert!(check_patch(r#"{"op":"move","path":"/a"}"#).is_err());
        assert!(check_patch(r#"{"op":"remove","path":"a"}"#).is_err());

        let mut clone = clone_of(vm_ref("a"), vm_ref("b"));
        clone.spec.patches = vec![r#"{"op":"remove"}"#.to_string()];
        let result = check(&clone);
        assert_eq!(result.causes[0].field, "spec.patches[0]");
    }
}
