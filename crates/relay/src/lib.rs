//! Top-level facade crate for the classroom translation relay.
//!
//! Re-exports the protocol/error crate and the gateway crate so downstream
//! consumers (integration tests, ops tooling) can depend on a single crate.

pub mod core {
    pub use relay_core::*;
}

pub mod gateway {
    pub use relay_gateway::*;
}
