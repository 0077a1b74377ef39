//! Admission webhook server.
//!
//! Serves one POST endpoint per resource kind (`/validate-<plural>`), plus
//! `/validate-virtualmachines-status` for the VirtualMachine status
//! subresource. Each handler unwraps the AdmissionReview, asks the
//! [`Admitter`] for a decision and wraps the decision back into a review.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a ValidatingWebhookConfiguration pointing at the endpoints
//! 3. Mount the TLS certificate secret at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{MethodRouter, post};
use axum::{Json, Router, extract::State, http::StatusCode};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use thiserror::Error;
use tracing::{error, info};

use super::decision::Decision;
use super::kind::ResourceKind;
use super::request::AdmissionAttributes;
use super::router::Admitter;
use crate::config::ConfigSource;
use crate::health::HealthState;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub admitter: Admitter,
    pub config: Arc<dyn ConfigSource>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(
        admitter: Admitter,
        config: Arc<dyn ConfigSource>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            admitter,
            config,
            health,
        }
    }
}

type ReviewResponse = (StatusCode, Json<AdmissionReview<DynamicObject>>);

fn endpoint(kind: ResourceKind) -> MethodRouter<Arc<WebhookState>> {
    post(
        move |State(state): State<Arc<WebhookState>>,
              Json(review): Json<AdmissionReview<DynamicObject>>| async move {
            handle_review(&state, kind, review)
        },
    )
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let mut router = Router::new();
    for kind in ResourceKind::ALL {
        router = router.route(&kind.endpoint(), endpoint(kind));
    }
    let status = ResourceKind::VirtualMachine;
    router
        .route(&format!("{}-status", status.endpoint()), endpoint(status))
        .with_state(state)
}

/// Decide one review sent to the endpoint of `kind`.
pub fn handle_review(
    state: &WebhookState,
    kind: ResourceKind,
    review: AdmissionReview<DynamicObject>,
) -> ReviewResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(kind = %kind, error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {e}"))
                        .into_review(),
                ),
            );
        }
    };

    let started = Instant::now();
    let decision = match AdmissionAttributes::from_request(&request) {
        Ok(attrs) => {
            let config = state.config.cluster_config();
            state.admitter.admit(kind, &attrs, &config)
        }
        Err(e) => {
            error!(
                uid = %request.uid,
                kind = %kind,
                error = %e,
                "Failed to read admission request"
            );
            Decision::fatal(&e)
        }
    };

    let metrics = &state.health.metrics;
    let operation = format!("{:?}", request.operation).to_uppercase();
    metrics.record_request(
        kind.kind(),
        &operation,
        decision.allowed,
        started.elapsed().as_secs_f64(),
    );
    if decision.is_fatal() {
        metrics.record_error(kind.kind());
    }

    let status = StatusCode::from_u16(decision.http_status()).unwrap_or(StatusCode::OK);
    let response = decision.into_response(AdmissionResponse::from(&request));
    (status, Json(response.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<port>`; certificates are PEM files reloaded only on
/// restart.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    port: u16,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
