//! Per-node dispatch loop of one signing round

use tokio::sync::oneshot;
use tracing::{debug, error, instrument};

use super::Packet;
use crate::cosign::{Challenge, Commitment, Cosi, Response};
use crate::overlay::{Mailboxes, Overlay};
use crate::suite::{Point, Scalar};
use crate::{Error, Result};

/// One node's run of the four-phase protocol.
///
/// The driver owns the node's [`Cosi`] signer for the round and reacts to
/// the phase mailboxes: it buffers child contributions until its whole
/// subtree reported, folds them through the signer, and forwards a single
/// message up or down the tree. A driver is one-shot; the next round uses
/// a fresh instance.
pub struct CosiProtocol<O: Overlay> {
    cosi: Cosi,
    overlay: O,
    mailboxes: Option<Mailboxes>,
    index: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Message to sign; required on the root, unused elsewhere
    message: Option<Vec<u8>>,
    /// Child commitments received so far, in arrival order
    pending_commits: Vec<Point>,
    /// Child responses received so far, in arrival order
    pending_responses: Vec<Scalar>,
    done: Option<oneshot::Sender<Vec<u8>>>,
}

impl<O: Overlay> CosiProtocol<O> {
    pub fn new(cosi: Cosi, overlay: O, mailboxes: Mailboxes) -> Self {
        let index = overlay.index();
        let tree = overlay.tree();
        let parent = tree.parent(index);
        let children = tree.children(index).to_vec();
        CosiProtocol {
            cosi,
            overlay,
            mailboxes: Some(mailboxes),
            index,
            parent,
            children,
            message: None,
            pending_commits: Vec::new(),
            pending_responses: Vec::new(),
            done: None,
        }
    }

    /// Set the message this round signs. Meaningful on the root only.
    pub fn set_message(&mut self, message: Vec<u8>) {
        self.message = Some(message);
    }

    /// Channel on which the root delivers the encoded signature
    pub fn done_channel(&mut self) -> oneshot::Receiver<Vec<u8>> {
        let (sender, receiver) = oneshot::channel();
        self.done = Some(sender);
        receiver
    }

    /// Run the round to completion.
    ///
    /// The root starts by announcing to its subtree; every other node
    /// waits for the announcement. The loop ends once this node played
    /// its part in the response phase (and, at the root, delivered the
    /// signature), or with an error that aborts the round on this node.
    #[instrument(skip_all, fields(node = self.index))]
    pub async fn run(mut self) -> Result<()> {
        let result = self.dispatch().await;
        if let Err(err) = &result {
            error!(%err, "signing round aborted");
        }
        result
    }

    async fn dispatch(&mut self) -> Result<()> {
        let mut mailboxes = self
            .mailboxes
            .take()
            .ok_or_else(|| Error::Transport("driver already running".into()))?;
        if self.parent.is_none() && self.handle_announce().await? {
            return Ok(());
        }
        loop {
            let complete = tokio::select! {
                Some(()) = mailboxes.announce.recv() => self.handle_announce().await?,
                Some(point) = mailboxes.commit.recv() => self.handle_commit(point).await?,
                Some(challenge) = mailboxes.challenge.recv() => {
                    self.handle_challenge(challenge).await?
                }
                Some(response) = mailboxes.response.recv() => {
                    self.handle_response(response).await?
                }
                else => return Ok(()),
            };
            if complete {
                return Ok(());
            }
        }
    }

    /// Forward the announcement down; leaves fall through to their
    /// commitment right away.
    async fn handle_announce(&mut self) -> Result<bool> {
        debug!("announcement");
        for &child in &self.children {
            self.overlay.send(child, Packet::Announce).await?;
        }
        if self.children.is_empty() {
            return self.complete_commit().await;
        }
        Ok(false)
    }

    async fn handle_commit(&mut self, point: Point) -> Result<bool> {
        self.pending_commits.push(point);
        debug!(
            received = self.pending_commits.len(),
            expected = self.children.len(),
            "child commitment"
        );
        if self.pending_commits.len() == self.children.len() {
            return self.complete_commit().await;
        }
        Ok(false)
    }

    /// Commit this node's subtree: generate the own commitment, fold the
    /// children's in, and either pass the folded point upward or, at the
    /// root, open the challenge phase.
    async fn complete_commit(&mut self) -> Result<bool> {
        let children: Vec<Commitment> = self
            .pending_commits
            .drain(..)
            .map(|point| Commitment {
                commitment: point,
                children_commit: None,
            })
            .collect();
        let own = if self.children.is_empty() {
            self.cosi.create_commitment(None)?
        } else {
            self.cosi.commit(None, &children)?
        };
        match self.parent {
            None => self.start_challenge().await,
            Some(parent) => {
                let folded =
                    own.commitment + own.children_commit.unwrap_or_else(Point::null);
                self.overlay.send(parent, Packet::Commit { point: folded }).await?;
                Ok(false)
            }
        }
    }

    /// Root only: derive the collective challenge and send it down
    async fn start_challenge(&mut self) -> Result<bool> {
        let message = self.message.take().ok_or(Error::MissingMessage)?;
        let challenge = self.cosi.create_challenge(&message)?;
        debug!("challenge opened");
        for &child in &self.children {
            self.overlay
                .send(child, Packet::Challenge { challenge: challenge.challenge })
                .await?;
        }
        if self.children.is_empty() {
            return self.complete_response().await;
        }
        Ok(false)
    }

    async fn handle_challenge(&mut self, challenge: Scalar) -> Result<bool> {
        self.cosi.challenge(&Challenge { challenge })?;
        debug!("challenge stored");
        for &child in &self.children {
            self.overlay
                .send(child, Packet::Challenge { challenge })
                .await?;
        }
        if self.children.is_empty() {
            return self.complete_response().await;
        }
        Ok(false)
    }

    async fn handle_response(&mut self, response: Scalar) -> Result<bool> {
        self.pending_responses.push(response);
        debug!(
            received = self.pending_responses.len(),
            expected = self.children.len(),
            "child response"
        );
        if self.pending_responses.len() == self.children.len() {
            return self.complete_response().await;
        }
        Ok(false)
    }

    /// Respond for this node's subtree. Non-roots fold and pass upward;
    /// the root checks the aggregate and delivers the signature.
    async fn complete_response(&mut self) -> Result<bool> {
        let children: Vec<Response> = self
            .pending_responses
            .drain(..)
            .map(|response| Response {
                response,
                children_response: None,
            })
            .collect();
        let own = if self.children.is_empty() {
            self.cosi.create_response()?
        } else {
            self.cosi.response(&children)?
        };
        match self.parent {
            Some(parent) => {
                let folded =
                    own.response + own.children_response.unwrap_or_else(Scalar::zero);
                self.overlay
                    .send(parent, Packet::Response { response: folded })
                    .await?;
            }
            None => {
                let aggregate_public = self.cosi.aggregate_public();
                self.cosi.verify_responses(&aggregate_public)?;
                let signature = self.cosi.signature()?;
                debug!("round complete");
                if let Some(done) = self.done.take() {
                    let _ = done.send(signature.to_bytes().to_vec());
                }
            }
        }
        Ok(true)
    }
}
