//! In-memory overlay for running a whole tree in one process

use std::sync::Arc;

use async_trait::async_trait;

use super::{MailboxSenders, Mailboxes, Overlay};
use crate::protocol::Packet;
use crate::tree::Tree;
use crate::{Error, Result};

const MAILBOX_CAPACITY: usize = 32;

/// Overlay of one in-process node, wired to its peers through channels
pub struct LocalOverlay {
    index: usize,
    tree: Arc<Tree>,
    peers: Arc<Vec<MailboxSenders>>,
}

/// Wire up one overlay and mailbox set per node of `tree`.
///
/// The returned vector is in tree-index order; entry `i` belongs to node
/// `i`. Used by tests and by rosters signed entirely in one process.
pub fn local_overlays(tree: Tree) -> Vec<(LocalOverlay, Mailboxes)> {
    let tree = Arc::new(tree);
    let (senders, mailboxes): (Vec<_>, Vec<_>) = (0..tree.len())
        .map(|_| MailboxSenders::channel(MAILBOX_CAPACITY))
        .unzip();
    let peers = Arc::new(senders);
    mailboxes
        .into_iter()
        .enumerate()
        .map(|(index, mailboxes)| {
            (
                LocalOverlay {
                    index,
                    tree: Arc::clone(&tree),
                    peers: Arc::clone(&peers),
                },
                mailboxes,
            )
        })
        .collect()
}

#[async_trait]
impl Overlay for LocalOverlay {
    fn index(&self) -> usize {
        self.index
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }

    async fn send(&self, to: usize, packet: Packet) -> Result<()> {
        let peer = self
            .peers
            .get(to)
            .ok_or_else(|| Error::Transport(format!("no node at index {to}")))?;
        peer.deliver(packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{Point, Scalar};

    #[tokio::test]
    async fn packets_route_to_their_phase_mailbox() {
        let tree = Tree::binary(2).unwrap();
        let mut nodes = local_overlays(tree);
        let (child, _child_mail) = nodes.remove(1);
        let (root, mut root_mail) = nodes.remove(0);

        root.send(1, Packet::Announce).await.unwrap();
        child
            .send(0, Packet::Commit { point: Point::null() })
            .await
            .unwrap();
        child
            .send(0, Packet::Response { response: Scalar::one() })
            .await
            .unwrap();

        assert_eq!(root_mail.commit.recv().await, Some(Point::null()));
        assert_eq!(root_mail.response.recv().await, Some(Scalar::one()));
    }

    #[tokio::test]
    async fn send_to_unknown_node_fails() {
        let mut nodes = local_overlays(Tree::binary(1).unwrap());
        let (only, _mail) = nodes.remove(0);
        assert!(only.send(7, Packet::Announce).await.is_err());
    }
}
