#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use smsgate_gateway::config::{self, LogFormat, NetworkAccounting};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
sampler:
  intervall_ms: 5000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:8080");
    assert_eq!(cfg.server.max_body_bytes, 64 * 1024);
    assert_eq!(cfg.sampler.interval_ms, 5000);
    assert_eq!(cfg.sampler.network_accounting, NetworkAccounting::Delta);
    assert_eq!(cfg.provider.region, "us-east-1");
    assert_eq!(cfg.provider.endpoint_url(), "https://sns.us-east-1.amazonaws.com/");
    assert_eq!(cfg.logging.format, LogFormat::Json);
}

#[test]
fn ok_full_config() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:9090"
sampler:
  interval_ms: 15000
  network_accounting: cumulative
provider:
  region: "sa-east-1"
  endpoint: "http://localhost:4566/"
  timeout_ms: 2500
logging:
  format: pretty
  filter: "smsgate_gateway=debug"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.server.listen_addr().unwrap().port(), 9090);
    assert_eq!(cfg.sampler.network_accounting, NetworkAccounting::Cumulative);
    assert_eq!(cfg.provider.endpoint_url(), "http://localhost:4566/");
    assert_eq!(cfg.provider.timeout().as_millis(), 2500);
    assert_eq!(cfg.logging.format, LogFormat::Pretty);
}

#[test]
fn rejects_out_of_range_values() {
    let cases = [
        "version: 2\n",
        "version: 1\nserver:\n  listen: \"not-an-addr\"\n",
        "version: 1\nsampler:\n  interval_ms: 10\n",
        "version: 1\nsampler:\n  network_accounting: sometimes\n",
        "version: 1\nprovider:\n  region: \"\"\n",
        "version: 1\nprovider:\n  timeout_ms: 0\n",
        "version: 1\nprovider:\n  endpoint: \"ftp://example.com\"\n",
        "version: 1\nprovider:\n  endpoint: \"http://localhost:4566/?Action=Publish\"\n",
        "version: 1\nserver:\n  max_body_bytes: 10\n",
    ];
    for yaml in cases {
        assert!(config::load_from_str(yaml).is_err(), "accepted: {yaml}");
    }
}
