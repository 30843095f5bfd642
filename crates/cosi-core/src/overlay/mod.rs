//! Overlay abstraction
//!
//! The protocol driver talks to its tree neighbours through an [`Overlay`]:
//! it knows the node's position in the spanning tree and can send one
//! phase message to any other node. Inbound traffic arrives through the
//! four typed [`Mailboxes`], one per phase. Delivery must preserve
//! per-sender FIFO order to a given recipient; ordering across senders is
//! not required.

pub mod memory;

pub use memory::{local_overlays, LocalOverlay};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::Packet;
use crate::suite::{Point, Scalar};
use crate::tree::Tree;
use crate::{Error, Result};

/// Message-passing capability handed to a protocol driver
#[async_trait]
pub trait Overlay: Send + Sync {
    /// This node's index in the spanning tree
    fn index(&self) -> usize;

    /// The spanning tree of the round
    fn tree(&self) -> &Tree;

    /// Deliver one phase message to the node at `to`. Fire-and-forget
    /// semantics; per-sender FIFO to a given recipient must hold.
    async fn send(&self, to: usize, packet: Packet) -> Result<()>;
}

/// Inbound mailboxes of one node, one per protocol phase
pub struct Mailboxes {
    pub announce: mpsc::Receiver<()>,
    pub commit: mpsc::Receiver<Point>,
    pub challenge: mpsc::Receiver<Scalar>,
    pub response: mpsc::Receiver<Scalar>,
}

/// Sending half of a node's mailboxes, held by the transport
#[derive(Clone)]
pub struct MailboxSenders {
    announce: mpsc::Sender<()>,
    commit: mpsc::Sender<Point>,
    challenge: mpsc::Sender<Scalar>,
    response: mpsc::Sender<Scalar>,
}

impl MailboxSenders {
    /// Create a linked sender/receiver pair of mailbox sets
    pub fn channel(capacity: usize) -> (MailboxSenders, Mailboxes) {
        let (announce_tx, announce_rx) = mpsc::channel(capacity);
        let (commit_tx, commit_rx) = mpsc::channel(capacity);
        let (challenge_tx, challenge_rx) = mpsc::channel(capacity);
        let (response_tx, response_rx) = mpsc::channel(capacity);
        (
            MailboxSenders {
                announce: announce_tx,
                commit: commit_tx,
                challenge: challenge_tx,
                response: response_tx,
            },
            Mailboxes {
                announce: announce_rx,
                commit: commit_rx,
                challenge: challenge_rx,
                response: response_rx,
            },
        )
    }

    /// Route a packet into the mailbox of its phase
    pub async fn deliver(&self, packet: Packet) -> Result<()> {
        fn closed<T>(_: mpsc::error::SendError<T>) -> Error {
            Error::Transport("mailbox closed".into())
        }
        match packet {
            Packet::Announce => self.announce.send(()).await.map_err(closed),
            Packet::Commit { point } => self.commit.send(point).await.map_err(closed),
            Packet::Challenge { challenge } => {
                self.challenge.send(challenge).await.map_err(closed)
            }
            Packet::Response { response } => {
                self.response.send(response).await.map_err(closed)
            }
        }
    }
}
