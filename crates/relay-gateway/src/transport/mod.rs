//! Transport layer (WebSocket accept loop and per-connection lifecycle).

pub mod ws;
