//! Ed25519 group suite
//!
//! Scalar and point arithmetic over the prime-order subgroup of Curve25519,
//! with the canonical little-endian encodings used on the wire, the
//! Fiat-Shamir cipher for challenge derivation, and the clamp-based public
//! key derivation of Ed25519.

use std::ops::{Add, Mul, Neg, Sub};

use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::traits::Identity;
use curve25519_dalek::EdwardsPoint;
use curve25519_dalek::Scalar as RawScalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Length of a canonically encoded scalar
pub const SCALAR_LENGTH: usize = 32;

/// Length of a canonically encoded point
pub const POINT_LENGTH: usize = 32;

/// Element of the scalar field `Z_q` of the group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroize)]
pub struct Scalar(RawScalar);

impl Scalar {
    /// The additive identity
    pub fn zero() -> Self {
        Scalar(RawScalar::ZERO)
    }

    /// The multiplicative identity
    pub fn one() -> Self {
        Scalar(RawScalar::ONE)
    }

    /// Interpret up to 64 little-endian bytes as a scalar, reducing mod `q`.
    ///
    /// Shorter input is zero-extended; more than 64 bytes is rejected with
    /// [`Error::ScalarEncoding`].
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 64 {
            return Err(Error::ScalarEncoding);
        }
        let mut wide = [0u8; 64];
        wide[..bytes.len()].copy_from_slice(bytes);
        let scalar = Scalar(RawScalar::from_bytes_mod_order_wide(&wide));
        wide.zeroize();
        Ok(scalar)
    }

    /// Sample a uniformly random scalar from 64 bytes of `rng` output
    pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        let scalar = Scalar(RawScalar::from_bytes_mod_order_wide(&bytes));
        bytes.zeroize();
        scalar
    }

    /// Canonical 32-byte little-endian encoding
    pub fn encode(&self) -> [u8; SCALAR_LENGTH] {
        self.0.to_bytes()
    }

    /// Decode a canonical 32-byte scalar, rejecting unreduced input
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SCALAR_LENGTH] =
            bytes.try_into().map_err(|_| Error::ScalarEncoding)?;
        Option::from(RawScalar::from_canonical_bytes(bytes))
            .map(Scalar)
            .ok_or(Error::ScalarEncoding)
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

/// Element of the prime-order group, `Null` being the identity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point(EdwardsPoint);

impl Point {
    /// The identity element
    pub fn null() -> Self {
        Point(EdwardsPoint::identity())
    }

    /// `B * s` for the group base point `B`
    pub fn mul_base(scalar: &Scalar) -> Self {
        Point(EdwardsPoint::mul_base(&scalar.0))
    }

    /// Canonical 32-byte encoding
    pub fn encode(&self) -> [u8; POINT_LENGTH] {
        self.0.compress().to_bytes()
    }

    /// Decode a 32-byte point encoding.
    ///
    /// Fails with [`Error::PointEncoding`] when the bytes are not on the
    /// curve or are a non-canonical encoding of a curve point.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; POINT_LENGTH] =
            bytes.try_into().map_err(|_| Error::PointEncoding)?;
        let compressed = CompressedEdwardsY(bytes);
        let point = compressed.decompress().ok_or(Error::PointEncoding)?;
        if point.compress() != compressed {
            return Err(Error::PointEncoding);
        }
        Ok(Point(point))
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Point;
    fn mul(self, rhs: Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

// Points travel as lowercase hex strings in rosters and config files.
impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.encode()))
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Point::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Deterministic Fiat-Shamir sponge.
///
/// A scalar picked from the cipher is the wide reduction of
/// `SHA512(seed || absorbed...)`; the absorb order is significant.
pub struct Cipher {
    state: Sha512,
}

impl Cipher {
    /// Seed a new cipher
    pub fn new(seed: &[u8]) -> Self {
        Cipher {
            state: Sha512::new().chain_update(seed),
        }
    }

    /// Feed message bytes into the cipher
    pub fn absorb(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Consume the cipher and derive a scalar from its state
    pub fn pick_scalar(self) -> Scalar {
        let digest: [u8; 64] = self.state.finalize().into();
        Scalar(RawScalar::from_bytes_mod_order_wide(&digest))
    }
}

/// The suite message hash, used for signing statements and fingerprints
pub fn digest(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

/// Derive the Ed25519 public key for a raw private scalar.
///
/// This is the digest-and-prune transformation of Ed25519: the private
/// encoding is hashed with SHA-512, the low 32 bytes are clamped, and the
/// clamped integer multiplies the base point.
///
/// The clamp is for rosters that sign with the clamped scalar, as Ed25519
/// wire compatibility requires. A signer that uses its raw scalar
/// directly, as [`Cosi`](crate::cosign::Cosi) does, must publish
/// `Point::mul_base(&private)` instead: the response `r = v - c*x` only
/// cancels against a public key produced from the same scalar.
pub fn ed25519_public(private: &Scalar) -> Point {
    let mut digest: [u8; 64] = Sha512::digest(private.encode()).into();
    let mut pruned = [0u8; 32];
    pruned.copy_from_slice(&digest[..32]);
    digest.zeroize();
    let public = Point(EdwardsPoint::mul_base_clamped(pruned));
    pruned.zeroize();
    public
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn scalar_encoding_round_trip() {
        let s = Scalar::random(&mut OsRng);
        let decoded = Scalar::decode(&s.encode()).unwrap();
        assert_eq!(s, decoded);
    }

    #[test]
    fn scalar_rejects_unreduced_encoding() {
        // 2^255 - 1 is far above the group order
        assert!(matches!(
            Scalar::decode(&[0xff; 32]),
            Err(Error::ScalarEncoding)
        ));
        assert!(matches!(Scalar::decode(&[0; 16]), Err(Error::ScalarEncoding)));
    }

    #[test]
    fn wide_reduction_accepts_up_to_64_bytes() {
        let s = Scalar::from_le_bytes(&[0xff; 64]).unwrap();
        assert_eq!(s, Scalar::decode(&s.encode()).unwrap());
        assert!(Scalar::from_le_bytes(&[0; 65]).is_err());
        // short input is zero-extended
        assert_eq!(Scalar::from_le_bytes(&[1]).unwrap(), Scalar::one());
    }

    #[test]
    fn point_encoding_round_trip() {
        let p = Point::mul_base(&Scalar::random(&mut OsRng));
        assert_eq!(p, Point::decode(&p.encode()).unwrap());
        assert_eq!(Point::null(), Point::decode(&Point::null().encode()).unwrap());
    }

    #[test]
    fn point_rejects_invalid_encoding() {
        assert!(matches!(Point::decode(&[0xff; 32]), Err(Error::PointEncoding)));
        assert!(matches!(Point::decode(&[1, 2, 3]), Err(Error::PointEncoding)));
    }

    #[test]
    fn cipher_is_deterministic_and_order_sensitive() {
        let pick = |seed: &[u8], msg: &[u8]| {
            let mut cipher = Cipher::new(seed);
            cipher.absorb(msg);
            cipher.pick_scalar()
        };
        assert_eq!(pick(b"seed", b"message"), pick(b"seed", b"message"));
        assert_ne!(pick(b"seed", b"message"), pick(b"message", b"seed"));
        assert_ne!(pick(b"seed", b"message"), pick(b"seed", b"massage"));
    }

    #[test]
    fn clamped_public_matches_manual_derivation() {
        let private = Scalar::random(&mut OsRng);
        let digest: [u8; 64] = Sha512::digest(private.encode()).into();
        let mut pruned = [0u8; 32];
        pruned.copy_from_slice(&digest[..32]);
        pruned[0] &= 248;
        pruned[31] &= 127;
        pruned[31] |= 64;
        // clamped value is below 2^255, so reducing mod q before the
        // multiplication lands on the same point
        let expected = Point::mul_base(&Scalar::from_le_bytes(&pruned).unwrap());
        assert_eq!(ed25519_public(&private), expected);
        // and it differs from the unclamped public
        assert_ne!(ed25519_public(&private), Point::mul_base(&private));
    }

    #[test]
    fn point_serde_as_hex() {
        let p = Point::mul_base(&Scalar::one());
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, format!("\"{}\"", hex::encode(p.encode())));
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
