//! Top-level facade crate for smsgate.
//!
//! Re-exports the core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use smsgate_core::*;
}

pub mod gateway {
    pub use smsgate_gateway::*;
}
