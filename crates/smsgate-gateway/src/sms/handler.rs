//! `POST /sms` handler.

use axum::{
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;

use smsgate_core::error::SmsGateError;

use crate::app_state::AppState;

fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

/// HTTP face of `SmsGateError`: `{"message": ...}` with the mapped status.
/// Details stay in the logs.
#[derive(Debug)]
pub struct ApiError(pub SmsGateError);

impl From<SmsGateError> for ApiError {
    fn from(e: SmsGateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.client_code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match self.0 {
            SmsGateError::Validation(_) => "Corpo de solicitação inválido",
            SmsGateError::ProviderSession(_) => "Falha ao criar uma nova sessão da AWS",
            SmsGateError::ProviderSend(_) => "Falha ao enviar SMS",
            _ => "Erro interno",
        };
        message_response(status, message)
    }
}

/// Unreadable or oversized bodies are invalid input, not transport errors.
impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self(SmsGateError::Validation(format!(
            "request body rejected ({}): {rejection}",
            rejection.status()
        )))
    }
}

pub async fn send_sms(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let provider = state.provider();
    let outcome = match body {
        Ok(body) => super::dispatch(provider.as_ref(), &body).await,
        Err(rejection) => Err(ApiError::from(rejection).0),
    };

    match outcome {
        Ok((req, id)) => {
            let text = req.confirmation(&id);
            tracing::info!(phone_number = %req.phone_number(), message_id = %id, "sms sent");
            Ok(message_response(StatusCode::OK, text))
        }
        Err(e) => {
            match &e {
                SmsGateError::Validation(_) => {
                    tracing::warn!(error = %e, "invalid sms request body")
                }
                _ => tracing::error!(
                    provider = provider.name(),
                    code = e.client_code().as_str(),
                    error = %e,
                    "sms dispatch failed"
                ),
            }
            Err(ApiError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status() {
        let cases = [
            (SmsGateError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (SmsGateError::ProviderSession("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (SmsGateError::ProviderSend("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (SmsGateError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
