//! Error types for admission handling.
//!
//! An [`Error`] aborts evaluation of a request. Unlike a [`Cause`], which
//! reports a rule violation in the submitted object, an error means the
//! request could not be evaluated at all; the decision composer turns it into
//! a denial with a stable top-level message and no structured causes.
//!
//! [`Cause`]: super::Cause

use thiserror::Error;

use crate::config::FeatureGate;
use crate::state::StateError;

/// Error type for admission evaluation
#[derive(Error, Debug)]
pub enum Error {
    /// The request was sent to the endpoint of a different resource
    #[error("expected resource to be {expected}, got {actual}")]
    UnexpectedResource { expected: String, actual: String },

    /// The object could not be decoded into the expected type
    #[error("could not decode {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The request carried no object
    #[error("missing object in request")]
    MissingObject,

    /// An update request carried no previous object
    #[error("missing old object in update request")]
    MissingOldObject,

    /// The resource is disabled by configuration
    #[error("{0}")]
    FeatureGateDisabled(String),

    /// A cluster state lookup failed
    #[error("cluster state lookup failed: {0}")]
    State(#[from] StateError),
}

impl Error {
    pub fn decode(kind: &'static str, source: serde_json::Error) -> Self {
        Error::Decode { kind, source }
    }

    /// Denial naming the gate that must be enabled.
    pub fn gate_disabled(gate: FeatureGate) -> Self {
        let message = match gate {
            FeatureGate::Snapshot => "Snapshot/Restore feature gate not enabled".to_string(),
            other => format!("{} feature gate is not enabled in kubevirt-config", other.name()),
        };
        Error::FeatureGateDisabled(message)
    }

    /// The request itself is malformed.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedResource { .. }
                | Error::Decode { .. }
                | Error::MissingObject
                | Error::MissingOldObject
        )
    }

    /// The failure lies with the webhook or its caches, not the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::State(_))
    }

    /// HTTP-style code reported in the admission status.
    pub fn code(&self) -> u16 {
        if self.is_internal() { 500 } else { 400 }
    }

    /// Message safe to return to the API client.
    ///
    /// Lookup failures are logged in full but reported generically.
    pub fn public_message(&self) -> String {
        match self {
            Error::State(_) => "internal error while evaluating admission request".to_string(),
            Error::Decode { kind, .. } => format!("could not decode {kind} object"),
            other => other.to_string(),
        }
    }
}

/// Result type alias for admission evaluation
pub type Result<T> = std::result::Result<T, Error>;
