//! smsgate gateway library entry.
//!
//! This crate wires the HTTP router, metrics registry, host stat sampler and
//! SMS provider into one service. It is consumed by the binary (`main.rs`) and
//! by integration tests.

pub mod app_state;
pub mod config;
pub mod logging;
pub mod obs;
pub mod ops;
pub mod router;
pub mod server;
pub mod sms;
