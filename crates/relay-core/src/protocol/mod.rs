//! Wire protocol for the classroom relay WebSocket.
//!
//! Every frame, inbound and outbound, is a single JSON object carrying a
//! `type` field. Inbound frames are decoded once into [`inbound::RawFrame`]
//! (header fields eagerly, the rest lazily as a JSON map) so that handlers
//! can pull out only the fields they need without a second full parse.

pub mod inbound;
pub mod outbound;

pub use inbound::RawFrame;
pub use outbound::Outbound;
