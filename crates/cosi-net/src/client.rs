//! Signing client
//!
//! Posts a signing request to the roster leader and decodes the JSON
//! `{sum, signature}` reply.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use cosi_core::service::{SignRequest, SignResponse, ROUND_TIMEOUT};
use cosi_core::tree::Roster;
use cosi_core::{Error, Result};

/// HTTP client for collective signing requests
pub struct CosiClient {
    http: Client,
    timeout: Duration,
}

impl CosiClient {
    pub fn new() -> Self {
        CosiClient {
            http: Client::new(),
            timeout: ROUND_TIMEOUT,
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the roster to collectively sign `message`.
    ///
    /// The request goes to the first roster entry, which leads the round;
    /// waiting is bounded by the client timeout.
    pub async fn sign(&self, roster: &Roster, message: &[u8]) -> Result<SignResponse> {
        let leader = roster.get(0).ok_or(Error::EmptyRoster)?;
        debug!(leader = %leader.address, "requesting collective signature");

        let request = SignRequest {
            message: message.to_vec(),
            roster: roster.clone(),
        };
        let response = self
            .http
            .post(format!("http://{}/v1/sign", leader.address))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    Error::Timeout
                } else {
                    Error::Transport(format!("contacting {}: {err}", leader.address))
                }
            })?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "{} replied {}",
                leader.address,
                response.status()
            )));
        }
        response
            .json::<SignResponse>()
            .await
            .map_err(|err| Error::Transport(format!("decoding reply: {err}")))
    }
}

impl Default for CosiClient {
    fn default() -> Self {
        Self::new()
    }
}
