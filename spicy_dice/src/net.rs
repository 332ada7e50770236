//! Wire format for client connections.
//!
//! Transport handling (framing, liveness, shutdown) lives in the server; this
//! module only defines the JSON envelopes both sides agree on.

/// Envelope types and request decoding.
pub mod messages;

pub use messages::{ClientRequest, Envelope, InboundEnvelope, MessageType};
