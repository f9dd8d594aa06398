//! Shared application state for the smsgate service.
//!
//! Holds the config, the metrics registry and the SMS provider. Cloned into
//! every handler and into the metrics middleware; the sampler gets the metrics
//! handle directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smsgate_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::ServiceMetrics;
use crate::sms::SmsProvider;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    metrics: Arc<ServiceMetrics>,
    provider: Arc<dyn SmsProvider>,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state. Fails if metric registration fails.
    pub fn new(cfg: GatewayConfig, provider: Arc<dyn SmsProvider>) -> Result<Self> {
        let metrics = Arc::new(ServiceMetrics::new()?);
        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                provider,
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<ServiceMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn provider(&self) -> Arc<dyn SmsProvider> {
        Arc::clone(&self.inner.provider)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
