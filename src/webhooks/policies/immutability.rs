//! Spec immutability on UPDATE.
//!
//! Snapshots, restores, exports and migrations freeze their spec once
//! created; metadata (labels, finalizers, owner references) stays mutable.

use crate::webhooks::cause::Cause;

/// Field reported for a rejected spec change.
pub const SPEC_FIELD: &str = "spec";

/// Deny the update if `new` differs from `old`.
pub fn validate_spec_unchanged<S: PartialEq>(
    new: &S,
    old: Option<&S>,
    message: impl Into<String>,
) -> Vec<Cause> {
    match old {
        Some(old) if old != new => vec![Cause::not_supported(SPEC_FIELD, message)],
        _ => Vec::new(),
    }
}

/// Standard message for kinds whose whole spec is frozen.
pub fn frozen_spec_message(kind: &str) -> String {
    format!("{kind} spec is immutable after creation")
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{TypedObjectReference, VirtualMachineSnapshotSpec};
    use crate::webhooks::cause::CauseKind;

    fn spec(name: &str) -> VirtualMachineSnapshotSpec {
        VirtualMachineSnapshotSpec {
            source: TypedObjectReference::new("kubevirt.io", "VirtualMachine", name),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_is_allowed() {
        assert!(validate_spec_unchanged(&spec("a"), None, "frozen").is_empty());
    }

    #[test]
    fn test_unchanged_spec_is_allowed() {
        assert!(validate_spec_unchanged(&spec("a"), Some(&spec("a")), "frozen").is_empty());
    }

    #[test]
    fn test_changed_spec_is_denied() {
        let causes = validate_spec_unchanged(
            &spec("b"),
            Some(&spec("a")),
            frozen_spec_message("VirtualMachineSnapshot"),
        );
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].kind, CauseKind::NotSupported);
        assert_eq!(causes[0].field, "spec");
        assert_eq!(
            causes[0].message,
            "VirtualMachineSnapshot spec is immutable after creation"
        );
    }
}
