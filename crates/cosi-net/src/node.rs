//! Cosigning node
//!
//! The HTTP surface of one server: a client-facing signing endpoint, a
//! peer-facing protocol endpoint, and the per-session registry that
//! routes inbound phase messages into the right driver's mailboxes. A
//! node first contacted mid-round joins it on demand, placing itself in
//! the spanning tree by its public key's roster index.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use cosi_core::cosign::Cosi;
use cosi_core::overlay::{MailboxSenders, Overlay};
use cosi_core::protocol::{CosiProtocol, Packet};
use cosi_core::service::{self, SignRequest, SignResponse, ROUND_TIMEOUT};
use cosi_core::suite::{Point, Scalar};
use cosi_core::tree::{Roster, Tree};
use cosi_core::{Error, Result};

use crate::wire::{Envelope, WirePacket};

const MAILBOX_CAPACITY: usize = 32;

/// One cosigning server, cheap to clone
#[derive(Clone)]
pub struct CosiNode {
    state: Arc<NodeState>,
}

struct NodeState {
    private: Scalar,
    public: Point,
    /// Mailbox senders of the rounds in flight, by session id
    sessions: DashMap<String, MailboxSenders>,
    http: reqwest::Client,
}

impl CosiNode {
    pub fn new(private: Scalar, public: Point) -> Self {
        CosiNode {
            state: Arc::new(NodeState {
                private,
                public,
                sessions: DashMap::new(),
                http: reqwest::Client::new(),
            }),
        }
    }

    /// This node's long-term public key
    pub fn public(&self) -> Point {
        self.state.public
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/v1/sign", post(handle_sign))
            .route("/v1/protocol", post(handle_protocol))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Serve the node on an already-bound listener until shutdown
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<()> {
        info!(
            public = %hex::encode(self.state.public.encode()),
            "cosigning node listening"
        );
        axum::serve(listener, self.router())
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}

type HandlerError = (StatusCode, Json<serde_json::Value>);

fn reject(err: Error) -> HandlerError {
    let status = match err {
        Error::EmptyRoster | Error::PointEncoding | Error::ScalarEncoding => {
            StatusCode::BAD_REQUEST
        }
        Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "cosi",
        "version": cosi_core::VERSION,
    }))
}

/// Client-facing entry point: lead one signing round over the roster
async fn handle_sign(
    State(state): State<Arc<NodeState>>,
    Json(request): Json<SignRequest>,
) -> std::result::Result<Json<SignResponse>, HandlerError> {
    sign_request(state, request).await.map(Json).map_err(reject)
}

async fn sign_request(state: Arc<NodeState>, request: SignRequest) -> Result<SignResponse> {
    let message = request.message;
    let roster = request.roster;
    let leader = roster.get(0).ok_or(Error::EmptyRoster)?;
    if leader.public != state.public {
        return Err(Error::Transport(
            "sign request addressed to a server that does not lead the roster".into(),
        ));
    }

    let session = hex::encode(rand::random::<[u8; 32]>());
    info!(session = %session, cosigners = roster.len(), "signing request received");

    let tree = service::roster_tree(&roster)?;
    let (senders, mailboxes) = MailboxSenders::channel(MAILBOX_CAPACITY);
    state.sessions.insert(session.clone(), senders);
    let overlay = HttpOverlay {
        index: tree.root(),
        tree,
        roster: roster.clone(),
        session: session.clone(),
        http: state.http.clone(),
    };
    let cosi = Cosi::new(state.private, roster.publics())?;

    let result = service::sign_round(cosi, overlay, mailboxes, &message).await;
    state.sessions.remove(&session);
    result
}

/// Peer-facing entry point: phase messages from tree neighbours
async fn handle_protocol(
    State(state): State<Arc<NodeState>>,
    Json(envelope): Json<Envelope>,
) -> std::result::Result<StatusCode, HandlerError> {
    let packet = envelope.payload.decode().map_err(reject)?;
    debug!(session = %envelope.session, from = envelope.from, "phase message received");
    let senders = session_senders(&state, &envelope).map_err(reject)?;
    senders.deliver(packet).await.map_err(reject)?;
    Ok(StatusCode::OK)
}

/// Look up the round's mailboxes, spawning a driver for a round this node
/// has not seen yet
fn session_senders(state: &Arc<NodeState>, envelope: &Envelope) -> Result<MailboxSenders> {
    match state.sessions.entry(envelope.session.clone()) {
        Entry::Occupied(occupied) => Ok(occupied.get().clone()),
        Entry::Vacant(vacant) => {
            let index = envelope
                .roster
                .index_of(&state.public)
                .ok_or_else(|| {
                    Error::Transport("this server is not part of the roster".into())
                })?;
            let tree = service::roster_tree(&envelope.roster)?;
            let (senders, mailboxes) = MailboxSenders::channel(MAILBOX_CAPACITY);
            let overlay = HttpOverlay {
                index,
                tree,
                roster: envelope.roster.clone(),
                session: envelope.session.clone(),
                http: state.http.clone(),
            };
            let cosi = Cosi::new(state.private, envelope.roster.publics())?;
            let driver = CosiProtocol::new(cosi, overlay, mailboxes);

            debug!(session = %envelope.session, index, "joining signing round");
            let registry = Arc::clone(state);
            let session = envelope.session.clone();
            tokio::spawn(async move {
                // a round that never completes must not leak its session
                let _ = tokio::time::timeout(ROUND_TIMEOUT, driver.run()).await;
                registry.sessions.remove(&session);
            });
            vacant.insert(senders.clone());
            Ok(senders)
        }
    }
}

/// Overlay of one node in one round, sending phase messages to the peers'
/// protocol endpoint
struct HttpOverlay {
    index: usize,
    tree: Tree,
    roster: Roster,
    session: String,
    http: reqwest::Client,
}

#[async_trait]
impl Overlay for HttpOverlay {
    fn index(&self) -> usize {
        self.index
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }

    async fn send(&self, to: usize, packet: Packet) -> Result<()> {
        let server = self
            .roster
            .get(to)
            .ok_or_else(|| Error::Transport(format!("no cosigner at index {to}")))?;
        let envelope = Envelope {
            session: self.session.clone(),
            roster: self.roster.clone(),
            from: self.index,
            payload: WirePacket::encode(&packet),
        };
        let response = self
            .http
            .post(format!("http://{}/v1/protocol", server.address))
            .json(&envelope)
            .timeout(ROUND_TIMEOUT)
            .send()
            .await
            .map_err(|err| Error::Transport(format!("sending to {}: {err}", server.address)))?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "peer {} replied {}",
                server.address,
                response.status()
            )));
        }
        Ok(())
    }
}
