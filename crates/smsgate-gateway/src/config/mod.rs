//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use smsgate_core::error::{Result, SmsGateError};

pub use schema::{
    GatewayConfig, LogFormat, LoggingSection, NetworkAccounting, ProviderSection, SamplerSection,
    ServerSection,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SMSGATE_CONFIG";
/// Path used when `SMSGATE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "smsgate.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| SmsGateError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| SmsGateError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config for the binary.
///
/// An explicit `SMSGATE_CONFIG` path must exist. The default path is optional:
/// when it is absent the built-in defaults apply. Returns the config and the
/// path it was read from, if any.
pub fn load_from_env() -> Result<(GatewayConfig, Option<String>)> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_from_file(&path).map(|cfg| (cfg, Some(path)));
    }
    match fs::read_to_string(DEFAULT_CONFIG_PATH) {
        Ok(s) => load_from_str(&s).map(|cfg| (cfg, Some(DEFAULT_CONFIG_PATH.to_string()))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let cfg = GatewayConfig::default();
            cfg.validate()?;
            Ok((cfg, None))
        }
        Err(e) => Err(SmsGateError::Config(format!(
            "read config {DEFAULT_CONFIG_PATH} failed: {e}"
        ))),
    }
}
