//! SMS request/result primitives.
//!
//! `SmsRequest` can only be built through validation, so holding one means both
//! fields are present and non-empty.

use std::fmt;

use serde::Deserialize;

use crate::error::{Result, SmsGateError};

/// Wire shape of `POST /sms`. Both fields are optional here so that a missing
/// field is reported as a validation error rather than a decode error.
#[derive(Debug, Deserialize)]
struct SmsBody {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A validated SMS send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRequest {
    phone_number: String,
    message: String,
}

impl SmsRequest {
    /// Validate a phone number + message pair.
    pub fn new(phone_number: impl Into<String>, message: impl Into<String>) -> Result<Self> {
        let phone_number = phone_number.into();
        let message = message.into();
        if phone_number.is_empty() {
            return Err(SmsGateError::Validation("phone_number is required".into()));
        }
        if message.is_empty() {
            return Err(SmsGateError::Validation("message is required".into()));
        }
        Ok(Self { phone_number, message })
    }

    /// Decode and validate a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: SmsBody = serde_json::from_slice(body)
            .map_err(|e| SmsGateError::Validation(format!("invalid json: {e}")))?;
        Self::new(
            raw.phone_number.unwrap_or_default(),
            raw.message.unwrap_or_default(),
        )
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Human-readable confirmation returned to the caller on success.
    pub fn confirmation(&self, id: &MessageId) -> String {
        format!(
            "SMS enviado com sucesso para {}. MessageId: {}",
            self.phone_number, id
        )
    }
}

/// Opaque provider-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a provider id. Empty ids are rejected: a publish that returns no id
    /// did not succeed from the caller's point of view.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SmsGateError::ProviderSend("provider returned an empty message id".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
