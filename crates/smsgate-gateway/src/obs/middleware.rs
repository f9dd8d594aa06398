//! Request metrics middleware.
//!
//! Wraps the whole router: the timer starts before the handler runs and both
//! samples are recorded after the downstream handler has produced its response,
//! so the status label is always the final one.

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use crate::app_state::AppState;

/// `endpoint` label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Route template when routing matched; unknown paths collapse into one series
/// so arbitrary 404 traffic cannot grow the label set.
fn endpoint_label(matched: Option<String>, raw_path: &str, status: StatusCode) -> String {
    match matched {
        Some(path) => path,
        None if status == StatusCode::NOT_FOUND => UNMATCHED_ENDPOINT.to_string(),
        None => raw_path.to_string(),
    }
}

pub async fn track_http(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().as_str().to_owned();
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned());
    let raw_path = req.uri().path().to_owned();
    let start = Instant::now();

    let res = next.run(req).await;

    let elapsed = start.elapsed();
    let endpoint = endpoint_label(matched, &raw_path, res.status());
    let status = res.status().as_u16().to_string();
    let metrics = state.metrics();
    metrics.http_response_time.observe(&[&method, &endpoint], elapsed);
    metrics.http_requests.inc(&[&method, &endpoint, &status]);

    tracing::debug!(%method, %endpoint, %status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_paths_share_one_label() {
        assert_eq!(endpoint_label(None, "/wp-login.php", StatusCode::NOT_FOUND), UNMATCHED_ENDPOINT);
        assert_eq!(endpoint_label(None, "/.env", StatusCode::NOT_FOUND), UNMATCHED_ENDPOINT);
    }

    #[test]
    fn matched_route_uses_template() {
        assert_eq!(
            endpoint_label(Some("/sms".into()), "/sms", StatusCode::BAD_REQUEST),
            "/sms"
        );
        assert_eq!(endpoint_label(None, "/sms", StatusCode::METHOD_NOT_ALLOWED), "/sms");
    }
}
