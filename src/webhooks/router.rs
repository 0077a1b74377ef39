//! Admission routing.
//!
//! [`Admitter::admit`] is the single entry point for one request: it checks
//! that the request targets the endpoint's resource, runs the structural
//! check, decodes the new and old objects and hands them to the policy
//! selected for the kind, subresource and operation.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::cause::Cause;
use super::decision::Decision;
use super::error::{Error, Result};
use super::kind::ResourceKind;
use super::policies::{
    self, ValidationContext, ValidationResult, Validator, clone, export, instance_create,
    instance_update, instancetype, kubevirt, migration, migration_policy, restore, snapshot,
    virtual_machine,
};
use super::request::{AdmissionAttributes, Operation};
use super::schema::SchemaValidator;
use crate::config::ClusterConfig;
use crate::crd::{
    KubeVirt, MigrationPolicy, VirtualMachine, VirtualMachineClone, VirtualMachineClusterFlavor,
    VirtualMachineClusterInstancetype, VirtualMachineClusterPreference, VirtualMachineExport,
    VirtualMachineFlavor, VirtualMachineInstance, VirtualMachineInstanceMigration,
    VirtualMachineInstancetype, VirtualMachinePreference, VirtualMachineRestore,
    VirtualMachineSnapshot,
};
use crate::state::ClusterState;

/// Pick the validator for `operation`.
fn by_operation<K>(
    operation: Operation,
    create: Validator<K>,
    update: Validator<K>,
) -> Validator<K> {
    match operation {
        Operation::Create => create,
        Operation::Update => update,
    }
}

/// Routes admission requests to the policies of their kind.
#[derive(Clone)]
pub struct Admitter {
    schema: Arc<dyn SchemaValidator>,
    state: Arc<dyn ClusterState>,
}

impl Admitter {
    pub fn new(schema: Arc<dyn SchemaValidator>, state: Arc<dyn ClusterState>) -> Self {
        Self { schema, state }
    }

    /// Decide one request sent to the endpoint of `kind`.
    pub fn admit(
        &self,
        kind: ResourceKind,
        attrs: &AdmissionAttributes,
        config: &ClusterConfig,
    ) -> Decision {
        debug!(
            uid = %attrs.uid,
            kind = %kind,
            operation = ?attrs.operation,
            namespace = %attrs.namespace,
            name = %attrs.name,
            dry_run = attrs.dry_run,
            "Processing admission request"
        );

        let decision = match self.evaluate(kind, attrs, config) {
            Ok(Evaluation::Skipped) => {
                debug!(uid = %attrs.uid, kind = %kind, "Operation not validated, allowing");
                return Decision::allow();
            }
            Ok(Evaluation::Shape(causes)) => Decision::deny(causes),
            Ok(Evaluation::Rules(result)) => Decision::compose(Ok(result)),
            Err(e) => {
                if e.is_internal() {
                    error!(
                        uid = %attrs.uid,
                        kind = %kind,
                        error = %e,
                        "Admission evaluation failed"
                    );
                } else {
                    warn!(uid = %attrs.uid, kind = %kind, error = %e, "Admission request rejected");
                }
                Decision::fatal(&e)
            }
        };

        if decision.allowed {
            info!(
                uid = %attrs.uid,
                kind = %kind,
                namespace = %attrs.namespace,
                name = %attrs.name,
                warnings = decision.warnings.len(),
                "Admission request allowed"
            );
        } else if !decision.is_fatal() {
            warn!(
                uid = %attrs.uid,
                kind = %kind,
                namespace = %attrs.namespace,
                name = %attrs.name,
                causes = decision.causes.len(),
                message = %decision.message,
                "Admission request denied"
            );
        }
        decision
    }

    fn evaluate(
        &self,
        kind: ResourceKind,
        attrs: &AdmissionAttributes,
        config: &ClusterConfig,
    ) -> Result<Evaluation> {
        let actual = &attrs.resource;
        if actual.group != kind.group() || actual.resource != kind.plural() {
            return Err(Error::UnexpectedResource {
                expected: kind.group_resource(),
                actual: actual.to_string(),
            });
        }
        let Some(operation) = attrs.operation else {
            return Ok(Evaluation::Skipped);
        };

        let causes = self.schema.check_shape(kind, &attrs.object);
        if !causes.is_empty() {
            return Ok(Evaluation::Shape(causes));
        }

        let result = match kind {
            ResourceKind::VirtualMachine if attrs.is_status_update() => {
                self.run::<VirtualMachine>(kind, attrs, config, virtual_machine::validate_status)
            }
            ResourceKind::VirtualMachine => {
                self.run::<VirtualMachine>(kind, attrs, config, virtual_machine::validate)
            }
            ResourceKind::VirtualMachineInstance => self.run::<VirtualMachineInstance>(
                kind,
                attrs,
                config,
                by_operation(operation, instance_create::validate, instance_update::validate),
            ),
            ResourceKind::Migration => self.run::<VirtualMachineInstanceMigration>(
                kind,
                attrs,
                config,
                by_operation(operation, migration::validate_create, migration::validate_update),
            ),
            ResourceKind::MigrationPolicy => {
                self.run::<MigrationPolicy>(kind, attrs, config, migration_policy::validate)
            }
            ResourceKind::Flavor => {
                self.run::<VirtualMachineFlavor>(kind, attrs, config, instancetype::validate_flavor)
            }
            ResourceKind::ClusterFlavor => self.run::<VirtualMachineClusterFlavor>(
                kind,
                attrs,
                config,
                instancetype::validate_flavor,
            ),
            ResourceKind::Instancetype => self.run::<VirtualMachineInstancetype>(
                kind,
                attrs,
                config,
                instancetype::validate_instancetype,
            ),
            ResourceKind::ClusterInstancetype => self.run::<VirtualMachineClusterInstancetype>(
                kind,
                attrs,
                config,
                instancetype::validate_instancetype,
            ),
            ResourceKind::Preference => self.run::<VirtualMachinePreference>(
                kind,
                attrs,
                config,
                instancetype::validate_preference,
            ),
            ResourceKind::ClusterPreference => self.run::<VirtualMachineClusterPreference>(
                kind,
                attrs,
                config,
                instancetype::validate_preference,
            ),
            ResourceKind::Snapshot => self.run::<VirtualMachineSnapshot>(
                kind,
                attrs,
                config,
                by_operation(operation, snapshot::validate_create, snapshot::validate_update),
            ),
            ResourceKind::Restore => self.run::<VirtualMachineRestore>(
                kind,
                attrs,
                config,
                by_operation(operation, restore::validate_create, restore::validate_update),
            ),
            ResourceKind::Clone => self.run::<VirtualMachineClone>(
                kind,
                attrs,
                config,
                by_operation(operation, clone::validate_create, policies::allow_all),
            ),
            ResourceKind::Export => self.run::<VirtualMachineExport>(
                kind,
                attrs,
                config,
                by_operation(operation, export::validate_create, export::validate_update),
            ),
            ResourceKind::KubeVirt => self.run::<KubeVirt>(
                kind,
                attrs,
                config,
                by_operation(operation, policies::allow_all, kubevirt::validate_update),
            ),
        }?;
        Ok(Evaluation::Rules(result))
    }

    /// Decode the objects of `attrs` as `K` and run `validate` on them.
    fn run<K: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        attrs: &AdmissionAttributes,
        config: &ClusterConfig,
        validate: Validator<K>,
    ) -> Result<ValidationResult> {
        let new: K = decode(kind, &attrs.object)?;
        let old: Option<K> = match attrs.operation {
            Some(Operation::Update) => {
                let raw = attrs.old_object.as_ref().ok_or(Error::MissingOldObject)?;
                Some(decode(kind, raw)?)
            }
            _ => None,
        };

        let ctx = ValidationContext {
            resource: &new,
            old_resource: old.as_ref(),
            request: attrs,
            config,
            state: self.state.as_ref(),
        };
        validate(&ctx)
    }
}

enum Evaluation {
    /// The operation is not subject to validation.
    Skipped,
    /// The object failed the structural check.
    Shape(Vec<Cause>),
    Rules(ValidationResult),
}

fn decode<K: DeserializeOwned>(kind: ResourceKind, value: &serde_json::Value) -> Result<K> {
    K::deserialize(value).map_err(|e| Error::decode(kind.kind(), e))
}
