use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use smsgate_core::error::{Result, SmsGateError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub provider: ProviderSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            sampler: SamplerSection::default(),
            provider: ProviderSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SmsGateError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.sampler.validate()?;
        self.provider.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Largest accepted `POST /sms` body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=10 * 1024 * 1024).contains(&self.max_body_bytes) {
            return Err(SmsGateError::Config(
                "server.max_body_bytes must be between 1024 and 10485760".into(),
            ));
        }
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            SmsGateError::Config(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

/// How cumulative OS network counters feed `network_traffic_bytes_total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAccounting {
    /// Add the difference between consecutive readings.
    #[default]
    Delta,
    /// Re-add the raw cumulative totals every tick. Over-counts; kept for
    /// compatibility with existing dashboards.
    Cumulative,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerSection {
    #[serde(default = "default_sampler_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub network_accounting: NetworkAccounting,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_sampler_interval_ms(),
            network_accounting: NetworkAccounting::default(),
        }
    }
}

impl SamplerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=600000).contains(&self.interval_ms) {
            return Err(SmsGateError::Config(
                "sampler.interval_ms must be between 1000 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    #[serde(default = "default_region")]
    pub region: String,

    /// Overrides `https://sns.<region>.amazonaws.com/`.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl ProviderSection {
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(SmsGateError::Config("provider.region must not be empty".into()));
        }
        if !(100..=120000).contains(&self.timeout_ms) {
            return Err(SmsGateError::Config(
                "provider.timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if let Some(ep) = &self.endpoint {
            let url = url::Url::parse(ep)
                .map_err(|e| SmsGateError::Config(format!("provider.endpoint invalid: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(SmsGateError::Config(
                    "provider.endpoint must be an http(s) URL with a host".into(),
                ));
            }
            // Requests are signed with an empty canonical query.
            if url.query().is_some() || url.fragment().is_some() {
                return Err(SmsGateError::Config(
                    "provider.endpoint must not carry a query string or fragment".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sns.{}.amazonaws.com/", self.region))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_sampler_interval_ms() -> u64 {
    5000
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_provider_timeout_ms() -> u64 {
    10000
}
fn default_log_filter() -> String {
    "info".into()
}
