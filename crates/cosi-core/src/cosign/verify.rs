//! Stateless collective signature verification

use super::Signature;
use crate::suite::{Cipher, Point, Scalar};
use crate::{Error, Result};

/// A cosigner that committed but did not respond: its public key is
/// removed from the aggregate and its commitment re-added during
/// verification.
#[derive(Clone, Copy, Debug)]
pub struct Exception {
    pub public: Point,
    pub commitment: Point,
}

/// Verify a collective signature over `message` against the ordered
/// cosigner public keys.
///
/// The aggregate commitment is reconstructed as `B*r + X_hat*c` and the
/// challenge recomputed from it; the signature is valid iff the recomputed
/// challenge equals the one carried in `signature`.
pub fn verify(publics: &[Point], message: &[u8], signature: &[u8]) -> Result<()> {
    if publics.is_empty() {
        return Err(Error::EmptyRoster);
    }
    let signature = Signature::from_bytes(signature)?;
    let aggregate_public = publics
        .iter()
        .fold(Point::null(), |acc, public| acc + *public);
    let commitment = reconstruct_commitment(&aggregate_public, &signature);
    check_challenge(message, &commitment, &signature.challenge)
}

/// Verify a collective signature while excluding cosigners that committed
/// but did not respond.
///
/// Each exception's public key is subtracted from `aggregate_public` before
/// reconstructing the commitment, and its commitment added back, so that a
/// signature aggregated without those responses still checks out.
pub fn verify_with_exceptions(
    aggregate_public: &Point,
    message: &[u8],
    challenge: &Scalar,
    response: &Scalar,
    exceptions: &[Exception],
) -> Result<()> {
    let mut reduced_public = *aggregate_public;
    let mut excluded_commit = Point::null();
    for exception in exceptions {
        reduced_public = reduced_public - exception.public;
        excluded_commit = excluded_commit + exception.commitment;
    }
    let commitment =
        Point::mul_base(response) + reduced_public * *challenge + excluded_commit;
    check_challenge(message, &commitment, challenge)
}

fn reconstruct_commitment(aggregate_public: &Point, signature: &Signature) -> Point {
    Point::mul_base(&signature.response) + *aggregate_public * signature.challenge
}

fn check_challenge(message: &[u8], commitment: &Point, challenge: &Scalar) -> Result<()> {
    let mut cipher = Cipher::new(&commitment.encode());
    cipher.absorb(message);
    if cipher.pick_scalar() != *challenge {
        return Err(Error::SignatureInvalid);
    }
    Ok(())
}
