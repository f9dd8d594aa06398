//! Shared error type across smsgate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request body.
    BadRequest,
    /// Provider session could not be established.
    ProviderUnavailable,
    /// Provider rejected or failed the publish call.
    ProviderFailed,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ClientCode::ProviderFailed => "PROVIDER_FAILED",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status code for this class of error.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::BadRequest => 400,
            ClientCode::ProviderUnavailable | ClientCode::ProviderFailed | ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SmsGateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum SmsGateError {
    /// Malformed or missing client input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Provider session setup failed (credentials, client construction).
    #[error("provider session failed: {0}")]
    ProviderSession(String),
    /// Provider publish call failed.
    #[error("provider send failed: {0}")]
    ProviderSend(String),
    /// OS statistics query failed. Never surfaced to clients.
    #[error("sampler read failed: {0}")]
    SamplerRead(String),
    /// A metric with the same name is already registered.
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SmsGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            SmsGateError::Validation(_) => ClientCode::BadRequest,
            SmsGateError::ProviderSession(_) => ClientCode::ProviderUnavailable,
            SmsGateError::ProviderSend(_) => ClientCode::ProviderFailed,
            SmsGateError::Config(_) => ClientCode::BadRequest,
            SmsGateError::SamplerRead(_)
            | SmsGateError::DuplicateMetric(_)
            | SmsGateError::Internal(_) => ClientCode::Internal,
        }
    }
}
