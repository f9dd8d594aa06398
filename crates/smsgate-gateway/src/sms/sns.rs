//! AWS SNS provider.
//!
//! Talks to the SNS query API directly: `Action=Publish` as a form-encoded,
//! SigV4-signed POST. Responses are small XML documents; only `MessageId` (on
//! success) and `Code`/`Message` (on error) are read from them.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use smsgate_core::error::{Result, SmsGateError};
use smsgate_core::sms::{MessageId, SmsRequest};

use crate::config::ProviderSection;
use crate::sms::sigv4::{self, SignableRequest, SigningParams};
use crate::sms::{SmsProvider, SmsSession};

const SERVICE: &str = "sns";
const API_VERSION: &str = "2010-03-31";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let access_key_id = non_empty("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| SmsGateError::ProviderSession("AWS_ACCESS_KEY_ID is not set".into()))?;
        let secret_access_key = non_empty("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| SmsGateError::ProviderSession("AWS_SECRET_ACCESS_KEY is not set".into()))?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty("AWS_SESSION_TOKEN"),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }
}

/// Where a session gets its credentials from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Re-read the process environment for every session.
    Environment,
    Static(Credentials),
}

impl CredentialSource {
    fn resolve(&self) -> Result<Credentials> {
        match self {
            CredentialSource::Environment => Credentials::from_env(),
            CredentialSource::Static(c) => Ok(c.clone()),
        }
    }
}

pub struct SnsProvider {
    region: String,
    endpoint: Url,
    http: reqwest::Client,
    credentials: CredentialSource,
}

impl SnsProvider {
    pub fn new(cfg: &ProviderSection, credentials: CredentialSource) -> Result<Self> {
        let endpoint = Url::parse(&cfg.endpoint_url())
            .map_err(|e| SmsGateError::Config(format!("provider endpoint invalid: {e}")))?;
        if endpoint.query().is_some() {
            return Err(SmsGateError::Config(format!(
                "provider endpoint must not carry a query string: {endpoint}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| SmsGateError::Internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            region: cfg.region.clone(),
            endpoint,
            http,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SmsProvider for SnsProvider {
    fn name(&self) -> &'static str {
        "sns"
    }

    async fn open_session(&self) -> Result<Box<dyn SmsSession>> {
        let credentials = self.credentials.resolve()?;
        let host = host_header(&self.endpoint)?;
        Ok(Box::new(SnsSession {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            host,
            http: self.http.clone(),
            credentials,
        }))
    }
}

/// `Host` value reqwest will send for `url` (port only when non-default).
fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| SmsGateError::ProviderSession(format!("endpoint has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

struct SnsSession {
    region: String,
    endpoint: Url,
    host: String,
    http: reqwest::Client,
    credentials: Credentials,
}

#[async_trait]
impl SmsSession for SnsSession {
    async fn publish(&self, req: &SmsRequest) -> Result<MessageId> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "Publish")
            .append_pair("Version", API_VERSION)
            .append_pair("PhoneNumber", req.phone_number())
            .append_pair("Message", req.message())
            .finish();

        let now = Utc::now();
        let amz_date = sigv4::amz_date(&now);

        let mut headers = vec![
            ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push((SECURITY_TOKEN_HEADER.to_string(), token.clone()));
        }

        let signable = SignableRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers,
            payload: body.as_bytes(),
        };
        let params = SigningParams {
            access_key_id: &self.credentials.access_key_id,
            secret_access_key: &self.credentials.secret_access_key,
            region: &self.region,
            service: SERVICE,
            time: now,
        };
        let auth = sigv4::authorization(&params, &signable)?;

        let mut rb = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header("x-amz-date", amz_date)
            .header(AUTHORIZATION, auth);
        if let Some(token) = &self.credentials.session_token {
            rb = rb.header(SECURITY_TOKEN_HEADER, token);
        }

        let resp = rb
            .body(body)
            .send()
            .await
            .map_err(|e| SmsGateError::ProviderSend(format!("sns request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SmsGateError::ProviderSend(format!("sns response read failed: {e}")))?;

        if !status.is_success() {
            let code = xml_tag(&text, "Code").unwrap_or("Unknown");
            let message = xml_tag(&text, "Message").unwrap_or("");
            return Err(SmsGateError::ProviderSend(format!(
                "sns returned {status} {code}: {message}"
            )));
        }

        let id = xml_tag(&text, "MessageId").ok_or_else(|| {
            SmsGateError::ProviderSend("sns response has no MessageId".into())
        })?;
        MessageId::new(id)
    }
}

/// Text content of the first `<tag>...</tag>` in `body`.
fn xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = start + body[start..].find(&close)?;
    Some(body[start..end].trim())
}
