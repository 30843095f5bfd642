//! Full rounds over real HTTP between in-process nodes

use cosi_core::suite::{Point, Scalar};
use cosi_core::tree::{Roster, ServerIdentity};
use cosi_net::{CosiClient, CosiNode};
use rand::rngs::OsRng;

/// Start `count` cosigning nodes on ephemeral ports and return the roster
/// covering them.
async fn start_nodes(count: usize) -> Roster {
    let mut servers = Vec::new();
    for _ in 0..count {
        let private = Scalar::random(&mut OsRng);
        let public = Point::mul_base(&private);
        let node = CosiNode::new(private, public);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(node.serve(listener));
        servers.push(ServerIdentity { address, public });
    }
    Roster::new(servers).unwrap()
}

fn publics(roster: &Roster) -> Vec<Point> {
    roster.publics()
}

#[tokio::test]
async fn two_servers_sign_over_http() {
    let roster = start_nodes(2).await;
    let client = CosiClient::new();
    let message = b"hello cosi service";
    let response = client.sign(&roster, message).await.unwrap();
    response.verify(&publics(&roster), message).unwrap();
}

#[tokio::test]
async fn five_servers_sign_over_http() {
    let roster = start_nodes(5).await;
    let client = CosiClient::new();
    let message = b"Hello World Cosi";
    let response = client.sign(&roster, message).await.unwrap();
    response.verify(&publics(&roster), message).unwrap();
}

#[tokio::test]
async fn single_server_check_round() {
    let roster = start_nodes(1).await;
    let client = CosiClient::new();
    let response = client.sign(&roster, b"verification").await.unwrap();
    response.verify(&publics(&roster), b"verification").unwrap();
}

#[tokio::test]
async fn non_leader_rejects_sign_request() {
    let roster = start_nodes(2).await;
    // address the second server while keeping it second in the roster:
    // it must refuse to lead
    let reordered = Roster::new(vec![
        ServerIdentity {
            address: roster.get(1).unwrap().address.clone(),
            public: roster.get(0).unwrap().public,
        },
        roster.get(1).unwrap().clone(),
    ])
    .unwrap();
    let client = CosiClient::new();
    assert!(client.sign(&reordered, b"x").await.is_err());
}
