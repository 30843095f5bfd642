//! End-to-end rounds of the tree protocol over the in-memory overlay

use std::time::Duration;

use cosi_core::cosign::{self, Cosi};
use cosi_core::overlay::local_overlays;
use cosi_core::protocol::CosiProtocol;
use cosi_core::suite::{Point, Scalar};
use cosi_core::tree::Tree;
use rand::rngs::OsRng;

const MESSAGE: &[u8] = b"Hello World Cosi";
const ROUND_DEADLINE: Duration = Duration::from_secs(5);

fn gen_keys(count: usize) -> (Vec<Scalar>, Vec<Point>) {
    let privates: Vec<Scalar> = (0..count).map(|_| Scalar::random(&mut OsRng)).collect();
    let publics = privates.iter().map(Point::mul_base).collect();
    (privates, publics)
}

/// Run one round over `tree`, every node in-process, and return the
/// signature produced at the root.
async fn run_tree(tree: Tree, message: &[u8]) -> (Vec<u8>, Vec<Point>) {
    let count = tree.len();
    let root_index = tree.root();
    let (privates, publics) = gen_keys(count);
    let mut drivers: Vec<_> = local_overlays(tree)
        .into_iter()
        .enumerate()
        .map(|(index, (overlay, mailboxes))| {
            let cosi = Cosi::new(privates[index], publics.clone()).unwrap();
            CosiProtocol::new(cosi, overlay, mailboxes)
        })
        .collect();

    let mut root = drivers.remove(root_index);
    root.set_message(message.to_vec());
    let done = root.done_channel();
    for driver in drivers {
        tokio::spawn(driver.run());
    }
    tokio::spawn(root.run());

    let signature = tokio::time::timeout(ROUND_DEADLINE, done)
        .await
        .expect("round timed out")
        .expect("root aborted");
    (signature, publics)
}

#[tokio::test]
async fn single_node_round() {
    let (signature, publics) = run_tree(Tree::binary(1).unwrap(), MESSAGE).await;
    cosign::verify(&publics, MESSAGE, &signature).unwrap();
}

#[tokio::test]
async fn two_node_round() {
    let (signature, publics) = run_tree(Tree::binary(2).unwrap(), MESSAGE).await;
    cosign::verify(&publics, MESSAGE, &signature).unwrap();
}

#[tokio::test]
async fn star_round() {
    let (signature, publics) = run_tree(Tree::binary(3).unwrap(), MESSAGE).await;
    cosign::verify(&publics, MESSAGE, &signature).unwrap();
}

#[tokio::test]
async fn three_level_chain_round() {
    let chain = Tree::from_parents(vec![None, Some(0), Some(1)]).unwrap();
    let (signature, publics) = run_tree(chain, MESSAGE).await;
    cosign::verify(&publics, MESSAGE, &signature).unwrap();
}

#[tokio::test]
async fn thirteen_node_binary_round() {
    let tree = Tree::binary(13).unwrap();
    // left-first BFS numbering
    assert_eq!(tree.children(0), &[1, 2]);
    assert_eq!(tree.children(1), &[3, 4]);
    let (signature, publics) = run_tree(tree, MESSAGE).await;
    cosign::verify(&publics, MESSAGE, &signature).unwrap();
}

#[tokio::test]
async fn signature_rejected_for_modified_message() {
    let (signature, publics) = run_tree(Tree::binary(3).unwrap(), MESSAGE).await;
    assert!(cosign::verify(&publics, b"Hello World cosi", &signature).is_err());
    assert_eq!(signature.len(), 64);
}

#[tokio::test]
async fn empty_message_round() {
    let (signature, publics) = run_tree(Tree::binary(2).unwrap(), b"").await;
    cosign::verify(&publics, b"", &signature).unwrap();
}

#[tokio::test]
async fn parallel_rounds_are_independent() {
    let first = run_tree(Tree::binary(2).unwrap(), b"first message");
    let second = run_tree(Tree::binary(2).unwrap(), b"second message");
    let ((sig_a, publics_a), (sig_b, publics_b)) = tokio::join!(first, second);
    cosign::verify(&publics_a, b"first message", &sig_a).unwrap();
    cosign::verify(&publics_b, b"second message", &sig_b).unwrap();
}
