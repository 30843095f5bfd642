//! Collective signing primitive
//!
//! The four-phase Schnorr aggregation protocol run by every node of the
//! signing tree:
//!
//! 1. Announcement: the leader multicasts the start of the round down the
//!    spanning tree.
//! 2. Commitment: each node picks a random secret `v` and commits to
//!    `V = B*v`; commitments are aggregated bottom-up.
//! 3. Challenge: the leader derives the collective challenge
//!    `c = H(V_hat || M)` and multicasts it down the tree.
//! 4. Response: each node computes `r = v - c*x`; responses are aggregated
//!    bottom-up into the final `(c, r_hat)` signature.

mod signer;
mod verify;

pub use signer::{Cosi, Phase};
pub use verify::{verify, verify_with_exceptions, Exception};

use crate::suite::{Point, Scalar, SCALAR_LENGTH};
use crate::{Error, Result};

/// Length in bytes of an encoded collective signature
pub const SIGNATURE_LENGTH: usize = 2 * SCALAR_LENGTH;

/// Commitment phase output: the node's own commitment and, on non-leaves,
/// the aggregate of its children's subtrees
#[derive(Clone, Copy, Debug)]
pub struct Commitment {
    /// This node's commitment `V = B*v`
    pub commitment: Point,
    /// Aggregate commitment of the children's subtrees, if any
    pub children_commit: Option<Point>,
}

/// Challenge phase output, passed down the tree unchanged
#[derive(Clone, Copy, Debug)]
pub struct Challenge {
    /// Collective challenge scalar
    pub challenge: Scalar,
}

/// Response phase output: the node's own response and, on non-leaves, the
/// aggregate of its children's subtrees
#[derive(Clone, Copy, Debug)]
pub struct Response {
    /// This node's response `r = v - c*x`
    pub response: Scalar,
    /// Aggregate response of the children's subtrees, if any
    pub children_response: Option<Scalar>,
}

/// The final collective signature `(c, r_hat)`.
///
/// Together with the ordered cosigner public keys and the message it is
/// enough to verify the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Collective challenge
    pub challenge: Scalar,
    /// Aggregate response
    pub response: Scalar,
}

impl Signature {
    /// Canonical 64-byte encoding: `encode(c) || encode(r_hat)`
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[..SCALAR_LENGTH].copy_from_slice(&self.challenge.encode());
        bytes[SCALAR_LENGTH..].copy_from_slice(&self.response.encode());
        bytes
    }

    /// Decode a 64-byte signature, rejecting non-canonical scalar halves
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(Error::ScalarEncoding);
        }
        Ok(Signature {
            challenge: Scalar::decode(&bytes[..SCALAR_LENGTH])?,
            response: Scalar::decode(&bytes[SCALAR_LENGTH..])?,
        })
    }
}
