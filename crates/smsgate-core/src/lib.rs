//! smsgate core: error taxonomy and SMS request primitives.
//!
//! This crate defines the validation rules and error surface shared by the
//! gateway and any other frontend that wants to dispatch SMS messages. It
//! carries no transport or runtime dependencies.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here; all fallible paths
//! surface as `SmsGateError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod sms;

/// Shared result type.
pub use error::{ClientCode, Result, SmsGateError};
pub use sms::{MessageId, SmsRequest};
