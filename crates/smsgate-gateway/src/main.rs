//! smsgate
//!
//! - `POST /sms`     : forward an SMS to AWS SNS
//! - `GET  /metrics` : Prometheus metrics (HTTP, CPU, memory, network)
//! - Background sampler polling host stats every `sampler.interval_ms`

use std::process::ExitCode;

use smsgate_gateway::{config, logging, server};

#[tokio::main]
async fn main() -> ExitCode {
    let (cfg, source) = match config::load_from_env() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("smsgate: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&cfg.logging);
    match &source {
        Some(path) => tracing::info!(%path, "config loaded"),
        None => tracing::info!("no config file, using defaults"),
    }

    match server::run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "smsgate failed");
            ExitCode::FAILURE
        }
    }
}
