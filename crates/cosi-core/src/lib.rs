//! # CoSi Core
//!
//! Tree-based collective signing over Ed25519-compatible group
//! arithmetic. A leader coordinates a set of cosigners arranged in a
//! spanning tree to jointly produce one short Schnorr-style signature
//! `(c, r_hat)` on a message; any verifier holding the ordered cosigner
//! public keys can check it against the aggregate key.
//!
//! This crate provides the building blocks of one signing round:
//! - the Ed25519 [`suite`]: scalar/point arithmetic, canonical encodings,
//!   the Fiat-Shamir cipher and the clamp-based public key derivation
//! - the per-node [`cosign`] signer running the four-phase protocol, and
//!   the stateless signature verifiers
//! - the [`protocol`] driver running the phases as a distributed
//!   aggregation over a spanning [`tree`], talking through an abstract
//!   [`overlay`]
//! - the [`service`] façade turning a message plus roster into a
//!   `{sum, signature}` response
//!
//! ## Example
//!
//! ```rust,ignore
//! use cosi_core::{cosign, service, suite};
//!
//! let response = service::sign_local(&privates, &publics, b"message").await?;
//! response.verify(&publics, b"message")?;
//! ```

pub mod cosign;
pub mod error;
pub mod overlay;
pub mod protocol;
pub mod service;
pub mod suite;
pub mod tree;

pub use cosign::{verify, Cosi, Signature};
pub use error::{Error, Result};
pub use service::{SignRequest, SignResponse};
pub use tree::{Roster, ServerIdentity, Tree};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
