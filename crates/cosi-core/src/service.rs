//! Signing service façade
//!
//! Request/response layer on top of the protocol driver: accept a message
//! and a roster, run one round over the deterministic binary tree, and
//! return the signature together with the double-hash fingerprint of the
//! message. Every round is bounded by [`ROUND_TIMEOUT`].

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::cosign::{self, Cosi};
use crate::overlay::{local_overlays, Mailboxes, Overlay};
use crate::protocol::CosiProtocol;
use crate::suite::{self, Point, Scalar};
use crate::tree::{Roster, Tree};
use crate::{Error, Result};

/// Deadline applied to every signing round
pub const ROUND_TIMEOUT: Duration = Duration::from_secs(10);

/// A client's request: the raw message to sign and the roster to sign it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignRequest {
    /// Raw message bytes
    #[serde(with = "base64_bytes")]
    pub message: Vec<u8>,
    /// Cosigners, in signing order; the first entry leads the round
    pub roster: Roster,
}

/// The service's reply.
///
/// `sum` is the double hash `H(H(message))` binding the signature to the
/// message without disclosing it; `signature` is the 64-byte collective
/// signature over `H(message)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignResponse {
    pub sum: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignResponse {
    /// Check this response against the content it claims to sign.
    ///
    /// Recomputes `H(content)` and `H(H(content))`, compares the latter to
    /// `sum`, then verifies the signature over `H(content)`.
    pub fn verify(&self, publics: &[Point], content: &[u8]) -> Result<()> {
        let statement = suite::digest(content);
        let sum = suite::digest(&statement);
        if sum[..] != self.sum[..] {
            return Err(Error::HashMismatch);
        }
        cosign::verify(publics, &statement, &self.signature)
    }
}

// The wire form is a JSON object of two base64 strings.
impl Serialize for SignResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        JsonSignature {
            sum: BASE64.encode(&self.sum),
            signature: BASE64.encode(&self.signature),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = JsonSignature::deserialize(deserializer)?;
        Ok(SignResponse {
            sum: BASE64.decode(&json.sum).map_err(D::Error::custom)?,
            signature: BASE64.decode(&json.signature).map_err(D::Error::custom)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct JsonSignature {
    sum: String,
    signature: String,
}

mod base64_bytes {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(&s).map_err(D::Error::custom)
    }
}

/// Drive the root of a round over `overlay` and wait for the signature.
///
/// The driver signs `H(message)`; the returned `sum` is `H(H(message))`.
/// On expiry of [`ROUND_TIMEOUT`] the driver task is cancelled, pending
/// mailbox reads are dropped, and the caller gets [`Error::Timeout`]; no
/// partial signature survives.
pub async fn sign_round<O>(
    cosi: Cosi,
    overlay: O,
    mailboxes: Mailboxes,
    message: &[u8],
) -> Result<SignResponse>
where
    O: Overlay + 'static,
{
    let statement = suite::digest(message);
    let sum = suite::digest(&statement).to_vec();

    let mut driver = CosiProtocol::new(cosi, overlay, mailboxes);
    driver.set_message(statement.to_vec());
    let done = driver.done_channel();
    let root = tokio::spawn(driver.run());

    debug!(message_len = message.len(), "starting signing round");
    match timeout(ROUND_TIMEOUT, done).await {
        Ok(Ok(signature)) => {
            info!("collective signature produced");
            Ok(SignResponse { sum, signature })
        }
        // the root driver aborted; its error was already logged
        Ok(Err(_)) => Err(Error::Timeout),
        Err(_) => {
            root.abort();
            Err(Error::Timeout)
        }
    }
}

/// Sign with every cosigner running in this process.
///
/// One signer and one driver per roster entry, wired over the in-memory
/// overlay along the deterministic binary tree. `privates` must match the
/// public keys in order.
pub async fn sign_local(
    privates: &[Scalar],
    publics: &[Point],
    message: &[u8],
) -> Result<SignResponse> {
    if privates.len() != publics.len() {
        return Err(Error::Transport(
            "one private key per cosigner required".into(),
        ));
    }
    let tree = Tree::binary(publics.len())?;
    let mut nodes = local_overlays(tree);
    let (root_overlay, root_mailboxes) = nodes.remove(0);
    for (child, (overlay, mailboxes)) in nodes.into_iter().enumerate() {
        let cosi = Cosi::new(privates[child + 1], publics.to_vec())?;
        let driver = CosiProtocol::new(cosi, overlay, mailboxes);
        tokio::spawn(driver.run());
    }
    let root = Cosi::new(privates[0], publics.to_vec())?;
    sign_round(root, root_overlay, root_mailboxes, message).await
}

/// Build the deterministic spanning tree of a roster
pub fn roster_tree(roster: &Roster) -> Result<Tree> {
    Tree::binary(roster.len())
}
