//! In-process metrics: registry, request middleware and host stat sampler.
//!
//! Metrics are stored as atomics and rendered by the `/metrics` handler. The
//! registry is constructed once in `AppState` and shared by reference; there is
//! no global instance.

pub mod metrics;
pub mod middleware;
pub mod sampler;

use std::sync::Arc;

use smsgate_core::error::Result;

use metrics::{CounterVec, GaugeVec, HistogramVec, Registry};

/// The service's metric families plus the registry that renders them.
pub struct ServiceMetrics {
    registry: Registry,
    pub http_requests: Arc<CounterVec>,
    pub http_response_time: Arc<HistogramVec>,
    pub cpu_usage: Arc<GaugeVec>,
    pub memory_usage: Arc<GaugeVec>,
    pub network_traffic: Arc<CounterVec>,
}

impl ServiceMetrics {
    /// Register every family on a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let http_requests = registry.register_counter(
            "http_requests_total",
            "Number of HTTP requests",
            &["method", "endpoint", "status_code"],
        )?;
        let http_response_time = registry.register_histogram(
            "http_response_time_seconds",
            "HTTP response time",
            &["method", "endpoint"],
        )?;
        let cpu_usage = registry.register_gauge("cpu_usage", "CPU usage percentage", &[])?;
        let memory_usage = registry.register_gauge("memory_usage", "Memory usage percentage", &[])?;
        let network_traffic = registry.register_counter(
            "network_traffic_bytes_total",
            "Network traffic in bytes",
            &["direction"],
        )?;

        Ok(Self {
            registry,
            http_requests,
            http_response_time,
            cpu_usage,
            memory_usage,
            network_traffic,
        })
    }

    /// Render all families in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.registry.render()
    }
}
