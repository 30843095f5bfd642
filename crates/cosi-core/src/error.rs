//! Error types for collective signing operations

use thiserror::Error;

use crate::cosign::Phase;

/// Result type alias for collective signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while producing or verifying a collective signature
#[derive(Debug, Error)]
pub enum Error {
    /// A signer or a roster was built from zero cosigners
    #[error("cosigner roster is empty")]
    EmptyRoster,

    /// Participation mask index beyond the roster
    #[error("mask index {index} out of range for {count} cosigners")]
    IndexOutOfRange { index: usize, count: usize },

    /// A signer operation was called out of order
    #[error("invalid phase: expected {expected:?}, got {actual:?}")]
    InvalidPhase { expected: Phase, actual: Phase },

    /// Response requested before the commitment phase ran
    #[error("no random secret committed in this round")]
    MissingRandom,

    /// Response requested before a challenge was received
    #[error("no challenge received in this round")]
    MissingChallenge,

    /// The root was started without a message to sign
    #[error("no signing message set on the root node")]
    MissingMessage,

    /// A wire element is not a valid curve point
    #[error("invalid point encoding")]
    PointEncoding,

    /// A wire element is not a canonical scalar
    #[error("invalid scalar encoding")]
    ScalarEncoding,

    /// The verification equation or the recomputed challenge failed
    #[error("signature verification failed")]
    SignatureInvalid,

    /// The round exceeded the global deadline
    #[error("signing round timed out")]
    Timeout,

    /// A file digest does not match the sum carried by its signature
    #[error("message hash does not match the signature sum")]
    HashMismatch,

    /// Overlay transport failure
    #[error("transport error: {0}")]
    Transport(String),
}
