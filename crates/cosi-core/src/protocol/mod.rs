//! Tree protocol driver
//!
//! Runs the four signing phases as a distributed aggregation over the
//! spanning tree: announcement travels top-down, commitments bottom-up,
//! the challenge top-down, responses bottom-up. The root ends the round
//! holding the collective signature.

mod driver;

pub use driver::CosiProtocol;

use crate::suite::{Point, Scalar};

/// One phase message between tree neighbours.
///
/// Commitment and response payloads are already folded: a node sends a
/// single point (its own commitment plus its subtree's) and a single
/// scalar upward, never a list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packet {
    /// Round start, forwarded down the tree. Carries no payload.
    Announce,
    /// Folded subtree commitment, sent to the parent
    Commit { point: Point },
    /// Collective challenge, forwarded down the tree
    Challenge { challenge: Scalar },
    /// Folded subtree response, sent to the parent
    Response { response: Scalar },
}
