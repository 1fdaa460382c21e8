use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Failures outside the REST contract: transport faults, decode faults,
/// and status codes the contract does not assign a meaning to.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected backend response ({status}): {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

/// Result of a token verification.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The token was accepted and the account is now linked.
    Linked { alias: Option<String> },
    /// The backend rejected the token (invalid or expired).
    Rejected { reason: Option<String> },
}

/// Connection status payload for a Telegram identity.
#[derive(Debug, Deserialize)]
pub struct ConnectionStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub telegram_username: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// Result of an unlink request.
#[derive(Debug, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected,
    /// No account is linked to this identity.
    NotLinked,
}

/// Result of registering a broadcast channel.
#[derive(Debug)]
pub enum ChannelOutcome {
    /// The channel is now linked to the actor's profile.
    Enabled { alias: Option<String> },
    /// The acting user has no linked profile.
    NoProfile,
    /// The channel is already linked.
    AlreadyLinked,
}

/// Result of a waitlist signup.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitlistOutcome {
    Joined,
    /// The backend rejected the wallet address.
    Rejected { reason: Option<String> },
    /// The wallet address is not known to the backend.
    UnknownWallet,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
    telegram_id: u64,
    telegram_username: &'a str,
}

#[derive(Serialize)]
struct DisconnectRequest {
    telegram_id: u64,
}

#[derive(Serialize)]
struct AddChannelRequest<'a> {
    telegram_id: u64,
    channel_id: i64,
    channel_name: &'a str,
    channel_username: Option<&'a str>,
}

#[derive(Serialize)]
struct WaitlistRequest<'a> {
    wallet_address: &'a str,
    telegram_user_id: String,
    telegram_username: &'a str,
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    #[serde(default)]
    alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the BroadCall backend REST API.
///
/// Each call maps the statuses the contract assigns a meaning to onto a
/// typed outcome; everything else is a [`BackendError`]. No retries are
/// performed.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Redeem a connection token for the given Telegram identity.
    pub async fn verify(
        &self,
        token: &str,
        telegram_id: u64,
        telegram_username: &str,
    ) -> Result<VerifyOutcome, BackendError> {
        let url = format!("{}/api/telegram/verify", self.base_url);

        debug!("Verifying connection token for {}", telegram_id);

        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest {
                token,
                telegram_id,
                telegram_username,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let payload: AliasResponse = response.json().await?;
                Ok(VerifyOutcome::Linked {
                    alias: payload.alias,
                })
            }
            StatusCode::BAD_REQUEST => {
                let payload: ErrorResponse = response.json().await.unwrap_or_default();
                Ok(VerifyOutcome::Rejected {
                    reason: payload.error,
                })
            }
            status => Err(unexpected(status, response).await),
        }
    }

    /// Query the connection status for a Telegram identity.
    pub async fn status(&self, telegram_id: u64) -> Result<ConnectionStatus, BackendError> {
        let url = format!("{}/api/telegram/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("telegram_id", telegram_id.to_string())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => Err(unexpected(status, response).await),
        }
    }

    /// Unlink the account connected to a Telegram identity.
    pub async fn disconnect(&self, telegram_id: u64) -> Result<DisconnectOutcome, BackendError> {
        let url = format!("{}/api/telegram/disconnect", self.base_url);

        let response = self
            .client
            .delete(&url)
            .json(&DisconnectRequest { telegram_id })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(DisconnectOutcome::Disconnected),
            StatusCode::NOT_FOUND => Ok(DisconnectOutcome::NotLinked),
            status => Err(unexpected(status, response).await),
        }
    }

    /// Register a broadcast channel under the acting user's profile.
    pub async fn add_channel(
        &self,
        telegram_id: u64,
        channel_id: i64,
        channel_name: &str,
        channel_username: Option<&str>,
    ) -> Result<ChannelOutcome, BackendError> {
        let url = format!("{}/api/telegram/add-channel", self.base_url);

        debug!("Registering channel {} for user {}", channel_id, telegram_id);

        let response = self
            .client
            .post(&url)
            .json(&AddChannelRequest {
                telegram_id,
                channel_id,
                channel_name,
                channel_username,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let payload: AliasResponse = response.json().await?;
                Ok(ChannelOutcome::Enabled {
                    alias: payload.alias,
                })
            }
            StatusCode::NOT_FOUND => Ok(ChannelOutcome::NoProfile),
            StatusCode::CONFLICT => Ok(ChannelOutcome::AlreadyLinked),
            status => Err(unexpected(status, response).await),
        }
    }

    /// Put a wallet address on the launch waitlist for this identity.
    pub async fn join_waitlist(
        &self,
        wallet_address: &str,
        telegram_id: u64,
        telegram_username: &str,
    ) -> Result<WaitlistOutcome, BackendError> {
        let url = format!("{}/api/waitlist/complete", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&WaitlistRequest {
                wallet_address,
                telegram_user_id: telegram_id.to_string(),
                telegram_username,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(WaitlistOutcome::Joined),
            StatusCode::BAD_REQUEST => {
                let payload: ErrorResponse = response.json().await.unwrap_or_default();
                Ok(WaitlistOutcome::Rejected {
                    reason: payload.error,
                })
            }
            StatusCode::NOT_FOUND => Ok(WaitlistOutcome::UnknownWallet),
            status => Err(unexpected(status, response).await),
        }
    }
}

async fn unexpected(status: StatusCode, response: reqwest::Response) -> BackendError {
    BackendError::UnexpectedStatus {
        status,
        body: response.text().await.unwrap_or_default(),
    }
}
