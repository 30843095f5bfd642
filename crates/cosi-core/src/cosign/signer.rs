//! Per-node signer state machine

use rand::rngs::OsRng;
use tracing::trace;
use zeroize::Zeroize;

use super::{Challenge, Commitment, Response, Signature};
use crate::suite::{Cipher, Point, Scalar};
use crate::{Error, Result};

/// Phase of the current signing round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No round material yet
    Fresh,
    /// Commitment generated, waiting for the challenge
    Committed,
    /// Challenge known, waiting to respond
    Challenged,
    /// Response produced; a signature can be extracted at the root
    Responded,
}

/// Per-round state, tagged by phase so that out-of-order operations are
/// rejected before touching any cryptographic material.
enum Round {
    Fresh,
    Committed {
        /// Ephemeral secret `v`
        random: Scalar,
        /// Aggregate commitment `V_hat` (own + subtree)
        aggregate: Point,
    },
    Challenged {
        random: Scalar,
        aggregate: Point,
        challenge: Scalar,
    },
    Responded {
        aggregate: Point,
        challenge: Scalar,
        /// Own response `r`
        response: Scalar,
        /// Aggregate response `r_hat` (own + subtree)
        aggregate_response: Scalar,
    },
}

impl Round {
    fn phase(&self) -> Phase {
        match self {
            Round::Fresh => Phase::Fresh,
            Round::Committed { .. } => Phase::Committed,
            Round::Challenged { .. } => Phase::Challenged,
            Round::Responded { .. } => Phase::Responded,
        }
    }
}

/// The stateful cosigner.
///
/// Holds the long-term private scalar, the ordered cosigner public keys
/// with the participation mask, and the material of the round in flight.
/// A round is the linear sequence commit -> challenge -> response; after
/// [`Cosi::signature`] the signer resets and can run further rounds.
pub struct Cosi {
    publics: Vec<Point>,
    /// Packed disable-mask: a set bit marks the cosigner at that index as
    /// not participating
    mask: Vec<u8>,
    /// Aggregate public key of the enabled cosigners, maintained
    /// incrementally on every mask change
    aggregate_public: Point,
    private: Scalar,
    round: Round,
}

impl Cosi {
    /// Create a signer over the ordered cosigner public keys.
    ///
    /// All cosigners start enabled; use [`Cosi::set_mask`] or
    /// [`Cosi::set_mask_bit`] to exclude some.
    pub fn new(private: Scalar, publics: Vec<Point>) -> Result<Self> {
        if publics.is_empty() {
            return Err(Error::EmptyRoster);
        }
        let aggregate_public = publics
            .iter()
            .fold(Point::null(), |acc, public| acc + *public);
        Ok(Cosi {
            mask: vec![0u8; Self::mask_len(publics.len())],
            publics,
            aggregate_public,
            private,
            round: Round::Fresh,
        })
    }

    /// Length in bytes of a complete participation mask for `count` cosigners
    pub fn mask_len(count: usize) -> usize {
        (count + 7) >> 3
    }

    /// Number of cosigners in the roster
    pub fn count(&self) -> usize {
        self.publics.len()
    }

    /// Aggregate public key of the currently enabled cosigners
    pub fn aggregate_public(&self) -> Point {
        self.aggregate_public
    }

    /// Current participation mask
    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    /// Phase of the round in flight
    pub fn phase(&self) -> Phase {
        self.round.phase()
    }

    /// Replace the whole participation mask.
    ///
    /// The mask is interpreted in little-endian bit order: bit `i & 7` of
    /// byte `i >> 3` covers cosigner `i`, set meaning disabled. A mask
    /// shorter than `mask_len` leaves the remaining cosigners enabled;
    /// bytes beyond `mask_len` are ignored.
    pub fn set_mask(&mut self, mask: &[u8]) {
        for i in 0..self.publics.len() {
            let byte = i >> 3;
            let bit = 1u8 << (i & 7);
            let disable = byte < mask.len() && mask[byte] & bit != 0;
            if disable {
                if self.mask[byte] & bit == 0 {
                    self.mask[byte] |= bit;
                    self.aggregate_public = self.aggregate_public - self.publics[i];
                }
            } else if self.mask[byte] & bit != 0 {
                self.mask[byte] &= !bit;
                self.aggregate_public = self.aggregate_public + self.publics[i];
            }
        }
    }

    /// Enable or disable a single cosigner
    pub fn set_mask_bit(&mut self, index: usize, enabled: bool) -> Result<()> {
        if index >= self.publics.len() {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.publics.len(),
            });
        }
        let byte = index >> 3;
        let bit = 1u8 << (index & 7);
        if enabled {
            if self.mask[byte] & bit != 0 {
                self.mask[byte] &= !bit;
                self.aggregate_public = self.aggregate_public + self.publics[index];
            }
        } else if self.mask[byte] & bit == 0 {
            self.mask[byte] |= bit;
            self.aggregate_public = self.aggregate_public - self.publics[index];
        }
        Ok(())
    }

    /// Whether the cosigner at `index` is enabled
    pub fn mask_bit(&self, index: usize) -> Result<bool> {
        if index >= self.publics.len() {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.publics.len(),
            });
        }
        Ok(self.mask[index >> 3] & (1u8 << (index & 7)) == 0)
    }

    /// Generate this round's commitment. Called by leaves.
    ///
    /// The ephemeral secret is drawn from the system RNG, or derived from
    /// `seed` when one is supplied.
    pub fn create_commitment(&mut self, seed: Option<&[u8]>) -> Result<Commitment> {
        let (random, own) = self.generate_commitment(seed)?;
        self.round = Round::Committed {
            random,
            aggregate: own,
        };
        Ok(Commitment {
            commitment: own,
            children_commit: None,
        })
    }

    /// Generate this round's commitment and fold in the children's.
    /// Called by non-leaves once every child commitment arrived.
    pub fn commit(&mut self, seed: Option<&[u8]>, children: &[Commitment]) -> Result<Commitment> {
        let (random, own) = self.generate_commitment(seed)?;
        let children_commit = children.iter().fold(Point::null(), |acc, child| {
            acc + child.commitment + child.children_commit.unwrap_or_else(Point::null)
        });
        self.round = Round::Committed {
            random,
            aggregate: own + children_commit,
        };
        Ok(Commitment {
            commitment: own,
            children_commit: Some(children_commit),
        })
    }

    fn generate_commitment(&mut self, seed: Option<&[u8]>) -> Result<(Scalar, Point)> {
        self.expect_phase(Phase::Fresh)?;
        let random = match seed {
            Some(seed) => Cipher::new(seed).pick_scalar(),
            None => Scalar::random(&mut OsRng),
        };
        Ok((random, Point::mul_base(&random)))
    }

    /// Derive the collective challenge from the aggregate commitment and
    /// the message. Root only, after the commitment phase.
    pub fn create_challenge(&mut self, message: &[u8]) -> Result<Challenge> {
        let Round::Committed { random, aggregate } = self.round else {
            return Err(self.phase_error(Phase::Committed));
        };
        let mut cipher = Cipher::new(&aggregate.encode());
        cipher.absorb(message);
        let challenge = cipher.pick_scalar();
        trace!(?challenge, "challenge derived");
        self.round = Round::Challenged {
            random,
            aggregate,
            challenge,
        };
        Ok(Challenge { challenge })
    }

    /// Store a challenge received from the parent and pass it on unchanged.
    /// Non-root nodes only.
    pub fn challenge(&mut self, challenge: &Challenge) -> Result<Challenge> {
        let Round::Committed { random, aggregate } = self.round else {
            return Err(self.phase_error(Phase::Committed));
        };
        self.round = Round::Challenged {
            random,
            aggregate,
            challenge: challenge.challenge,
        };
        Ok(*challenge)
    }

    /// Compute this node's response `r = v - c*x`. Called by leaves.
    ///
    /// Fails with [`Error::MissingRandom`] when no commitment was made
    /// this round and [`Error::MissingChallenge`] when no challenge
    /// arrived yet.
    pub fn create_response(&mut self) -> Result<Response> {
        let response = self.generate_response(Scalar::zero())?;
        Ok(Response {
            response,
            children_response: None,
        })
    }

    /// Compute this node's response and fold in the children's. Called by
    /// non-leaves once every child response arrived.
    pub fn response(&mut self, children: &[Response]) -> Result<Response> {
        let children_response = children.iter().fold(Scalar::zero(), |acc, child| {
            acc + child.response + child.children_response.unwrap_or_else(Scalar::zero)
        });
        let response = self.generate_response(children_response)?;
        Ok(Response {
            response,
            children_response: Some(children_response),
        })
    }

    fn generate_response(&mut self, children_response: Scalar) -> Result<Scalar> {
        let Round::Challenged {
            ref mut random,
            aggregate,
            challenge,
        } = self.round
        else {
            // name the missing precondition rather than just the phase
            return Err(match self.round.phase() {
                Phase::Fresh => Error::MissingRandom,
                Phase::Committed => Error::MissingChallenge,
                _ => self.phase_error(Phase::Challenged),
            });
        };
        let response = *random - challenge * self.private;
        // v is consumed; it must not survive the round
        random.zeroize();
        self.round = Round::Responded {
            aggregate,
            challenge,
            response,
            aggregate_response: response + children_response,
        };
        Ok(response)
    }

    /// Check the aggregate response against the aggregate public key:
    /// `B*r_hat + X_hat*c == V_hat`. Root-side sanity check.
    pub fn verify_responses(&self, aggregate_public: &Point) -> Result<()> {
        let Round::Responded {
            aggregate,
            challenge,
            aggregate_response,
            ..
        } = self.round
        else {
            return Err(self.phase_error(Phase::Responded));
        };
        let reconstructed =
            Point::mul_base(&aggregate_response) + *aggregate_public * challenge;
        if reconstructed != aggregate {
            return Err(Error::SignatureInvalid);
        }
        Ok(())
    }

    /// Extract the collective signature `(c, r_hat)`.
    ///
    /// Defined only at the root once the response phase completed. The
    /// per-round ephemerals are wiped and the signer resets for the next
    /// round.
    pub fn signature(&mut self) -> Result<Signature> {
        let Round::Responded {
            challenge,
            aggregate_response,
            ..
        } = self.round
        else {
            return Err(self.phase_error(Phase::Responded));
        };
        let signature = Signature {
            challenge,
            response: aggregate_response,
        };
        self.clear_round();
        Ok(signature)
    }

    /// Wipe the material of the round in flight and return to `Fresh`
    pub fn clear_round(&mut self) {
        match &mut self.round {
            Round::Fresh => {}
            Round::Committed { random, .. } | Round::Challenged { random, .. } => {
                random.zeroize();
            }
            Round::Responded { response, .. } => response.zeroize(),
        }
        self.round = Round::Fresh;
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.round.phase() != expected {
            return Err(self.phase_error(expected));
        }
        Ok(())
    }

    fn phase_error(&self, expected: Phase) -> Error {
        Error::InvalidPhase {
            expected,
            actual: self.round.phase(),
        }
    }
}

impl Drop for Cosi {
    fn drop(&mut self) {
        self.clear_round();
        self.private.zeroize();
    }
}
