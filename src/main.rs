//! virt-admission - validating admission webhooks for KubeVirt resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client and the cluster state caches
//! - Starts the health server, then the webhook server once caches synced

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use virt_admission::config::ProcessConfig;
use virt_admission::health::{HealthState, run_health_server};
use virt_admission::state::ReflectorState;
use virt_admission::webhooks::{Admitter, CrdSchemaValidator, WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("virt_admission=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    let config = ProcessConfig::from_env();
    info!(
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        install_namespace = %config.install_namespace,
        "Starting virt-admission"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let cluster = Arc::new(ReflectorState::spawn(&client, &config.install_namespace));
    let health_state = Arc::new(HealthState::new());

    // Probes answer while the caches sync; readiness flips once they have.
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    cluster.wait_until_ready().await?;
    health_state.set_ready(true).await;

    let webhook_state = Arc::new(WebhookState::new(
        Admitter::new(Arc::new(CrdSchemaValidator::new()), cluster.clone()),
        cluster,
        health_state.clone(),
    ));
    let webhook_handle = {
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(
                webhook_state,
                config.webhook_port,
                &config.cert_path,
                &config.key_path,
            )
            .await
            {
                error!("Webhook server error: {}", e);
            }
        })
    };

    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the API server stops routing requests here
            health_state.set_ready(false).await;
            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("virt-admission stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal; the process cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
