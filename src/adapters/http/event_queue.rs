//! Event queue long-poll over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::CapsConfig;
use crate::ports::{EventQueueTransport, PollError, PollRequest, PollResponse};

use super::build_client;

/// Event queue transport.
///
/// The server holds each request open until it has events or its own hold
/// time runs out. A hold expiring surfaces as 502 or 504 and is reported
/// as an empty batch; 404 means the queue is gone.
#[derive(Debug, Clone)]
pub struct ReqwestEventQueue {
    client: Client,
    timeout: Duration,
}

impl ReqwestEventQueue {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            timeout,
        })
    }

    pub fn from_config(config: &CapsConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.poll_timeout(), &config.user_agent)
    }

    fn classify(&self, e: reqwest::Error) -> PollError {
        if e.is_timeout() {
            PollError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            PollError::Network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl EventQueueTransport for ReqwestEventQueue {
    async fn poll(&self, uri: &Url, request: PollRequest) -> Result<PollResponse, PollError> {
        let response = self
            .client
            .post(uri.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| self.classify(e))?;
                if body.is_empty() {
                    return Ok(PollResponse::empty());
                }
                serde_json::from_slice(&body).map_err(|e| PollError::Malformed(e.to_string()))
            }
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => Ok(PollResponse::empty()),
            StatusCode::NOT_FOUND => Err(PollError::NotFound),
            status => Err(PollError::Http {
                status: status.as_u16(),
            }),
        }
    }
}
