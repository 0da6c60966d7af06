//! Webhook delivery. The receiver answers with a small envelope telling us
//! whether the work succeeded and, on failure, how long to wait before the
//! retry.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::{TokenIssuer, TOKEN_HEADER};
use relay_store::Job;
use serde::Deserialize;
use tracing::debug;

use crate::error::CallbackError;

/// Per-request client timeout.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
/// Outer deadline for one delivery, covering the request and body read.
const CALL_DEADLINE: Duration = Duration::from_secs(60);

/// What the receiver told us about the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success,
    Failure {
        /// Receiver-chosen seconds until the retry; 0 means "use the job's
        /// own interval".
        interval: i64,
    },
}

#[async_trait]
pub trait CallbackClient: Send + Sync {
    async fn invoke(&self, job: &Job) -> Result<CallbackOutcome, CallbackError>;
}

#[derive(Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    status: String,
    #[serde(default)]
    interval: i64,
}

/// Production client: POSTs the payload with a signed internal token.
pub struct HttpCallback {
    client: reqwest::Client,
    issuer: TokenIssuer,
}

impl HttpCallback {
    pub fn new(issuer: TokenIssuer) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self { client, issuer })
    }
}

#[async_trait]
impl CallbackClient for HttpCallback {
    async fn invoke(&self, job: &Job) -> Result<CallbackOutcome, CallbackError> {
        let token = self.issuer.issue(&job.service_name, &job.user_id)?;
        let request = self
            .client
            .post(&job.callback_url)
            .header(TOKEN_HEADER, token)
            .json(&job.payload);

        let delivery = async {
            let response = request.send().await?;
            if !response.status().is_success() {
                debug!(job_id = job.id, status = %response.status(), "callback returned non-success status");
                return Ok(CallbackOutcome::Failure { interval: 0 });
            }
            match response.json::<Envelope>().await {
                Ok(envelope) if envelope.data.status == "SUCCESS" => Ok(CallbackOutcome::Success),
                Ok(envelope) => Ok(CallbackOutcome::Failure {
                    interval: envelope.data.interval,
                }),
                Err(err) => {
                    debug!(job_id = job.id, error = %err, "callback response not understood");
                    Ok(CallbackOutcome::Failure { interval: 0 })
                }
            }
        };

        match tokio::time::timeout(CALL_DEADLINE, delivery).await {
            Ok(result) => result,
            Err(_) => Err(CallbackError::Timeout),
        }
    }
}
