//! AWS Signature Version 4 for query-protocol requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use smsgate_core::error::{Result, SmsGateError};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SmsGateError::Internal(format!("hmac key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn amz_date(t: &DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Derive the signing key for one day/region/service scope.
pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Who is signing, and for which scope.
pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request covered by the signature.
///
/// `headers` must already contain `host` and `x-amz-date`. `query` must be in
/// canonical (sorted, encoded) form.
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: Vec<(String, String)>,
    pub payload: &'a [u8],
}

impl SignableRequest<'_> {
    /// Returns (canonical request, signed header list).
    fn canonical(&self) -> (String, String) {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        headers.sort();

        let canonical_headers: String = headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let payload_hash = hex::encode(Sha256::digest(self.payload));

        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method, self.path, self.query, canonical_headers, signed_headers, payload_hash
        );
        (canonical, signed_headers)
    }
}

/// Compute the `Authorization` header value.
pub fn authorization(params: &SigningParams<'_>, req: &SignableRequest<'_>) -> Result<String> {
    let date_stamp = params.time.format("%Y%m%d").to_string();
    let scope = format!(
        "{date_stamp}/{}/{}/aws4_request",
        params.region, params.service
    );

    let (canonical, signed_headers) = req.canonical();
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(&params.time),
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(params.secret_access_key, &date_stamp, params.region, params.service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.access_key_id
    ))
}
