//! Admission decisions and their rendering into review responses.
//!
//! A [`Decision`] is either an allow (possibly with warnings), a denial
//! carrying the ordered causes, or a fatal denial produced from an
//! [`Error`]. Fatal denials never carry causes.

use kube::core::admission::AdmissionResponse;
use kube::core::response::{Status, StatusCause, StatusDetails, StatusSummary};

use super::cause::Cause;
use super::error::{Error, Result};
use super::policies::ValidationResult;

/// Reason reported for rule violations.
pub const REASON_INVALID: &str = "Invalid";
/// Reason reported for malformed requests.
pub const REASON_BAD_REQUEST: &str = "BadRequest";
/// Reason reported for failures inside the webhook.
pub const REASON_INTERNAL: &str = "InternalError";
/// Reason reported when a feature gate refuses the request.
pub const REASON_FORBIDDEN: &str = "Forbidden";

/// Outcome of one admission request.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Top-level message shown to the client; empty on allow.
    pub message: String,
    pub reason: String,
    pub code: u16,
    pub causes: Vec<Cause>,
    pub warnings: Vec<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: String::new(),
            reason: String::new(),
            code: 200,
            causes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Deny with rule violations. The message joins the cause messages in
    /// evaluation order.
    pub fn deny(causes: Vec<Cause>) -> Self {
        let message = causes
            .iter()
            .map(|c| c.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            allowed: false,
            message,
            reason: REASON_INVALID.to_string(),
            code: 400,
            causes,
            warnings: Vec::new(),
        }
    }

    /// Deny because the request could not be evaluated.
    pub fn fatal(error: &Error) -> Self {
        let reason = if error.is_internal() {
            REASON_INTERNAL
        } else if error.is_bad_request() {
            REASON_BAD_REQUEST
        } else {
            REASON_FORBIDDEN
        };
        Self {
            allowed: false,
            message: error.public_message(),
            reason: reason.to_string(),
            code: error.code(),
            causes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Compose the outcome of a validator run. Warnings only survive on an
    /// allowed request.
    pub fn compose(result: Result<ValidationResult>) -> Self {
        match result {
            Err(e) => Self::fatal(&e),
            Ok(result) if result.is_allowed() => Self::allow().with_warnings(result.warnings),
            Ok(result) => Self::deny(result.causes),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !self.allowed && self.causes.is_empty()
    }

    /// HTTP status for the review response. Rejections travel inside a 200;
    /// only malformed requests and internal faults change the status.
    pub fn http_status(&self) -> u16 {
        if !self.is_fatal() {
            return 200;
        }
        match self.reason.as_str() {
            REASON_INTERNAL => 500,
            REASON_BAD_REQUEST => 400,
            _ => 200,
        }
    }

    /// Render onto `response`, which already carries the request uid.
    pub fn into_response(self, mut response: AdmissionResponse) -> AdmissionResponse {
        if !self.warnings.is_empty() {
            response.warnings = Some(self.warnings);
        }
        if self.allowed {
            return response;
        }

        let details = (!self.causes.is_empty()).then(|| StatusDetails {
            name: String::new(),
            group: String::new(),
            kind: String::new(),
            uid: String::new(),
            causes: self
                .causes
                .into_iter()
                .map(|cause| StatusCause {
                    reason: cause.kind.as_str().to_string(),
                    message: cause.message,
                    field: cause.field,
                })
                .collect(),
            retry_after_seconds: 0,
        });
        response.allowed = false;
        response.result = Status {
            status: Some(StatusSummary::Failure),
            message: self.message,
            reason: self.reason,
            details,
            code: self.code,
        };
        response
    }
}
