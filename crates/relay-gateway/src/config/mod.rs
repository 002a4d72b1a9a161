//! Gateway config loader (strict parsing, validated once at startup).

pub mod schema;

pub use schema::GatewayConfig;

use relay_core::error::Result;

pub fn load_from_env() -> Result<GatewayConfig> {
    GatewayConfig::from_env()
}
