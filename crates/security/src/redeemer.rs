//! Secret-lease redemption: exchanges a single-use token at an external
//! redeemer URL for the decoded secret value.

use base64::Engine;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;

const MAX_RESPONSE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct SecretLease {
    pub secret_ref: String,
    pub redemption_token: String,
    pub kuze_url: String,
}

#[derive(Debug, Deserialize)]
struct RedeemerResponse {
    #[allow(dead_code)]
    secret_ref: String,
    #[allow(dead_code)]
    secret_type: String,
    value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RedeemerError {
    #[error("request to redeemer failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("redeemer returned status {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("redeemer response was not valid JSON: {0}")]
    Decode(serde_json::Error),
    #[error("redeemer returned an empty secret value")]
    EmptyValue,
    #[error("redeemer value was not valid base64: {0}")]
    Base64(base64::DecodeError),
}

/// Redeems one lease against its `kuze_url`, returning the decoded secret
/// bytes. `agent_id` is sent as `X-Agent-ID` so the redeemer can scope the
/// token to the calling agent.
pub async fn redeem(
    client: &reqwest::Client,
    agent_id: &str,
    lease: &SecretLease,
    timeout: Duration,
) -> Result<Vec<u8>, RedeemerError> {
    let response = client
        .get(&lease.kuze_url)
        .header("X-Agent-ID", agent_id)
        .bearer_auth(&lease.redemption_token)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if status.as_u16() != 200 {
        let body = response.text().await.unwrap_or_default();
        let trimmed: String = body.chars().take(200).collect();
        return Err(RedeemerError::BadStatus {
            status: status.as_u16(),
            body: trimmed,
        });
    }

    // Stream the body and stop reading as soon as the cap is hit, rather
    // than buffering the whole response before truncating — a misbehaving
    // redeemer shouldn't be able to force an unbounded allocation here.
    let mut capped = Vec::with_capacity(MAX_RESPONSE_BYTES.min(8 * 1024));
    let mut byte_stream = response.bytes_stream();
    while let Some(chunk) = byte_stream.next().await {
        capped.extend_from_slice(&chunk?);
        if capped.len() > MAX_RESPONSE_BYTES {
            capped.truncate(MAX_RESPONSE_BYTES);
            break;
        }
    }

    let decoded: RedeemerResponse =
        serde_json::from_slice(&capped).map_err(RedeemerError::Decode)?;

    if decoded.value.is_empty() {
        return Err(RedeemerError::EmptyValue);
    }

    base64::engine::general_purpose::STANDARD
        .decode(decoded.value)
        .map_err(RedeemerError::Base64)
}
