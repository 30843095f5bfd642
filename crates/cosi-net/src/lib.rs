//! # CoSi over HTTP
//!
//! The networked face of collective signing: a cosigning node serving the
//! client-facing signing endpoint plus the peer-facing protocol endpoint,
//! and the client that asks a roster for a signature. Phase messages
//! travel as JSON envelopes carrying the roster, so any server named in a
//! roster can be pulled into a round it has not seen before.

pub mod client;
pub mod node;
pub mod wire;

pub use client::CosiClient;
pub use node::CosiNode;
pub use wire::{Envelope, WirePacket};
