//! Process wiring: provider, state, sampler, listener, graceful shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use smsgate_core::error::{Result, SmsGateError};

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::obs::sampler::{Sampler, SysinfoSource};
use crate::router;
use crate::sms::{CredentialSource, SnsProvider};

/// Run the service until ctrl-c / SIGTERM.
pub async fn run(cfg: GatewayConfig) -> Result<()> {
    let listen = cfg.server.listen_addr()?;
    let provider = Arc::new(SnsProvider::new(&cfg.provider, CredentialSource::Environment)?);
    tracing::info!(region = %cfg.provider.region, endpoint = %provider.endpoint(), "sns provider configured");

    let state = AppState::new(cfg, provider)?;

    let cancel = CancellationToken::new();
    let sampler_cfg = &state.cfg().sampler;
    let sampler = Sampler::new(SysinfoSource::new(), state.metrics(), sampler_cfg.network_accounting)
        .spawn(sampler_cfg.interval(), cancel.clone());

    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| SmsGateError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "smsgate starting");

    let app = router::build_router(state.clone());
    let shutdown = {
        let state = state.clone();
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            state.set_draining();
            cancel.cancel();
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SmsGateError::Internal(format!("server failed: {e}")))?;

    cancel.cancel();
    if let Err(e) = sampler.await {
        tracing::warn!(error = %e, "sampler task ended abnormally");
    }
    tracing::info!("smsgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining");
}
