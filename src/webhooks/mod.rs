//! Validating admission webhooks for the virtualization resources.
//!
//! A request flows through these stages:
//! - [`server`]: unwraps the AdmissionReview and picks the endpoint's kind
//! - [`router`]: checks the resource, runs the structural check and
//!   dispatches to a policy by kind, subresource and operation
//! - [`policies`]: the per-kind rules, producing ordered [`Cause`]s
//! - [`decision`]: turns causes or a fatal [`Error`] into the response

pub mod cause;
pub mod decision;
pub mod error;
pub mod kind;
pub mod policies;
pub mod request;
pub mod router;
pub mod schema;
mod server;

pub use cause::{Cause, CauseKind, FieldPath};
pub use decision::Decision;
pub use error::{Error, Result};
pub use kind::ResourceKind;
pub use policies::{ValidationContext, ValidationResult};
pub use request::{AdmissionAttributes, GroupVersionResource, Operation, UserIdentity};
pub use router::Admitter;
pub use schema::{CrdSchemaValidator, SchemaValidator};
pub use server::{
    WebhookError, WebhookState, create_webhook_router, handle_review, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
