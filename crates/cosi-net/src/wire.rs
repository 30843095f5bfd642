//! JSON wire types exchanged between tree neighbours
//!
//! Point and scalar payloads travel as base64 strings of their canonical
//! 32-byte encodings; rosters carry hex public keys; session identifiers
//! are hex. The client-facing signing request reuses the service layer's
//! [`SignRequest`](cosi_core::SignRequest) JSON form directly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use cosi_core::protocol::Packet;
use cosi_core::suite::{Point, Scalar};
use cosi_core::tree::Roster;
use cosi_core::{Error, Result};

/// Envelope around one phase message between tree neighbours.
///
/// Every envelope carries the roster, so that a node first contacted
/// mid-round can place itself in the spanning tree and join in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Round identifier, hex
    pub session: String,
    /// The cosigners of this round, in signing order
    pub roster: Roster,
    /// Tree index of the sender
    pub from: usize,
    /// The phase message
    pub payload: WirePacket,
}

/// Phase message payload
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WirePacket {
    Announce,
    Commit { point: String },
    Challenge { challenge: String },
    Response { response: String },
}

impl WirePacket {
    pub fn encode(packet: &Packet) -> Self {
        match packet {
            Packet::Announce => WirePacket::Announce,
            Packet::Commit { point } => WirePacket::Commit {
                point: BASE64.encode(point.encode()),
            },
            Packet::Challenge { challenge } => WirePacket::Challenge {
                challenge: BASE64.encode(challenge.encode()),
            },
            Packet::Response { response } => WirePacket::Response {
                response: BASE64.encode(response.encode()),
            },
        }
    }

    pub fn decode(&self) -> Result<Packet> {
        let decode = |field: &str| {
            BASE64
                .decode(field)
                .map_err(|err| Error::Transport(format!("invalid base64 payload: {err}")))
        };
        Ok(match self {
            WirePacket::Announce => Packet::Announce,
            WirePacket::Commit { point } => Packet::Commit {
                point: Point::decode(&decode(point)?)?,
            },
            WirePacket::Challenge { challenge } => Packet::Challenge {
                challenge: Scalar::decode(&decode(challenge)?)?,
            },
            WirePacket::Response { response } => Packet::Response {
                response: Scalar::decode(&decode(response)?)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_round_trip() {
        let packets = [
            Packet::Announce,
            Packet::Commit {
                point: Point::mul_base(&Scalar::one()),
            },
            Packet::Challenge {
                challenge: Scalar::one(),
            },
            Packet::Response {
                response: Scalar::zero(),
            },
        ];
        for packet in packets {
            let wire = WirePacket::encode(&packet);
            let json = serde_json::to_string(&wire).unwrap();
            let back: WirePacket = serde_json::from_str(&json).unwrap();
            assert_eq!(back.decode().unwrap(), packet);
        }
    }

    #[test]
    fn corrupted_point_rejected() {
        let wire = WirePacket::Commit {
            point: BASE64.encode([0xff; 32]),
        };
        assert!(matches!(wire.decode(), Err(Error::PointEncoding)));

        let wire = WirePacket::Challenge {
            challenge: "not base64!".into(),
        };
        assert!(matches!(wire.decode(), Err(Error::Transport(_))));
    }
}
