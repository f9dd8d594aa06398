//! SMS dispatch: provider abstraction, AWS SNS implementation, HTTP handler.
//!
//! A request moves `received -> validated -> dispatched -> {succeeded | failed}`
//! with no retries; every failure is terminal for that request.

pub mod handler;
pub mod sigv4;
pub mod sns;

use async_trait::async_trait;

use smsgate_core::error::Result;
use smsgate_core::sms::{MessageId, SmsRequest};

pub use sns::{CredentialSource, Credentials, SnsProvider};

/// External SMS delivery service.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Establish a client session. Errors are `SmsGateError::ProviderSession`.
    async fn open_session(&self) -> Result<Box<dyn SmsSession>>;
}

/// One provider session, good for a single dispatch.
#[async_trait]
pub trait SmsSession: Send + Sync {
    /// Send the message. Errors are `SmsGateError::ProviderSend`.
    async fn publish(&self, req: &SmsRequest) -> Result<MessageId>;
}

/// Validate a raw JSON body and send it through `provider`.
///
/// Validation failures return before the provider is touched; a failed
/// session returns before anything is published.
pub async fn dispatch(provider: &dyn SmsProvider, body: &[u8]) -> Result<(SmsRequest, MessageId)> {
    let req = SmsRequest::from_json(body)?;
    let session = provider.open_session().await?;
    let id = session.publish(&req).await?;
    Ok((req, id))
}
