//! # Authority Transport
//!
//! Stateless HTTPS client for the tax authority. Knows operations and
//! endpoints, not business records; never touches the ledger.
//!
//! ## Outcome Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   One send(), three possible outcomes                   │
//! │                                                                         │
//! │  POST body ──► reqwest ──┬── connect / DNS / timeout ──┐               │
//! │                          ├── HTTP 4xx / 5xx ───────────┤ retried with  │
//! │                          ├── 2xx, not an envelope ─────┘ backoff       │
//! │                          │                                │             │
//! │                          │                  exhausted ────▼             │
//! │                          │                  TransportFailed             │
//! │                          │                  (NETWORK_ERROR)             │
//! │                          │                                              │
//! │                          ├── 2xx, resultCd != "000" ──► Rejected        │
//! │                          │                              (never retried) │
//! │                          │                                              │
//! │                          └── 2xx, resultCd == "000" ──► Accepted        │
//! │                                                         (data kept)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `send` returns a value for every outcome; it has no error path.

use larder_core::{FailureDetails, Operation, RESULT_CODE_NETWORK_ERROR};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FiscalConfig;
use crate::error::{FiscalError, FiscalResult};
use crate::protocol::{AuthorityReply, HEADER_BRANCH_ID, HEADER_CMC_KEY, HEADER_TIN};
use crate::retry::{with_retry, Exhausted, RetryPolicy};

// =============================================================================
// Outcomes
// =============================================================================

/// How a single attempt failed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No HTTP response: connect, DNS, TLS or timeout.
    Connection(String),
    /// A response, but not 2xx.
    Status { status: u16, body: String },
    /// 2xx with a body that is not an authority envelope.
    Malformed(String),
}

impl AttemptFailure {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AttemptFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Connection(e) => write!(f, "connection failed: {e}"),
            AttemptFailure::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            AttemptFailure::Malformed(e) => write!(f, "malformed reply: {e}"),
        }
    }
}

/// The classified result of a `send`.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// `resultCd == "000"`.
    Accepted(AuthorityReply),
    /// The authority answered with another result code.
    Rejected(AuthorityReply),
    /// Every attempt failed before an envelope came back.
    TransportFailed {
        message: String,
        attempts: u32,
        http_status: Option<u16>,
    },
}

impl SendOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Accepted(_))
    }

    /// The authority's code, or `NETWORK_ERROR`.
    pub fn result_code(&self) -> &str {
        match self {
            SendOutcome::Accepted(reply) | SendOutcome::Rejected(reply) => &reply.result_cd,
            SendOutcome::TransportFailed { .. } => RESULT_CODE_NETWORK_ERROR,
        }
    }

    pub fn result_message(&self) -> &str {
        match self {
            SendOutcome::Accepted(reply) | SendOutcome::Rejected(reply) => &reply.result_msg,
            SendOutcome::TransportFailed { message, .. } => message,
        }
    }

    /// The accepted reply's `data`.
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            SendOutcome::Accepted(reply) => reply.data.as_ref(),
            _ => None,
        }
    }

    /// Ledger detail for a failed outcome.
    pub fn failure_details(&self) -> Option<FailureDetails> {
        match self {
            SendOutcome::Accepted(_) => None,
            SendOutcome::Rejected(reply) => Some(reply.to_failure()),
            SendOutcome::TransportFailed {
                message,
                attempts,
                http_status,
            } => Some(FailureDetails {
                result_code: Some(RESULT_CODE_NETWORK_ERROR.to_string()),
                result_message: Some(message.clone()),
                attempts: Some(*attempts),
                http_status: *http_status,
            }),
        }
    }

    /// Accepted replies as `Ok`, everything else as the matching error.
    pub fn into_result(self) -> FiscalResult<AuthorityReply> {
        match self {
            SendOutcome::Accepted(reply) => Ok(reply),
            SendOutcome::Rejected(reply) => Err(FiscalError::Rejected {
                code: reply.result_cd,
                message: reply.result_msg,
            }),
            SendOutcome::TransportFailed {
                message, attempts, ..
            } => Err(FiscalError::Network { message, attempts }),
        }
    }
}

impl From<Exhausted<AttemptFailure>> for SendOutcome {
    fn from(exhausted: Exhausted<AttemptFailure>) -> Self {
        SendOutcome::TransportFailed {
            http_status: exhausted.error.http_status(),
            message: exhausted.error.to_string(),
            attempts: exhausted.attempts,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Authority client. Cheap to clone; clones share one connection pool.
///
/// ## Usage
/// ```rust,ignore
/// let client = FiscalClient::new(Arc::new(config))?;
/// match client.send(Operation::SaveSale, &body).await {
///     SendOutcome::Accepted(reply) => store(reply.data),
///     SendOutcome::Rejected(reply) => show(reply.result_msg),
///     SendOutcome::TransportFailed { .. } => retry_later(),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FiscalClient {
    http: Client,
    config: Arc<FiscalConfig>,
    policy: RetryPolicy,
}

impl FiscalClient {
    /// Builds the HTTP client with the tenant headers and per-attempt
    /// timeout from `config`.
    ///
    /// `config` is validated first: no request leaves without the full
    /// tenant identity.
    pub fn new(config: Arc<FiscalConfig>) -> FiscalResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in [
            (HEADER_TIN, &config.tenant.tin),
            (HEADER_BRANCH_ID, &config.tenant.branch_id),
            (HEADER_CMC_KEY, &config.tenant.cmc_key),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| FiscalError::InvalidConfig(format!("{name} is not a valid header value")))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FiscalError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(FiscalClient {
            http,
            policy: config.retry_policy(),
            config,
        })
    }

    /// Replaces the retry policy taken from the configuration.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &FiscalConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<FiscalConfig> {
        self.config.clone()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `body` to the operation's endpoint and classifies the reply.
    pub async fn send(&self, operation: Operation, body: &serde_json::Value) -> SendOutcome {
        let url = self.config.endpoint_url(operation);
        debug!(%operation, %url, "Sending to tax authority");

        let result = with_retry(&self.policy, |attempt| {
            let url = url.as_str();
            async move { self.attempt(operation, url, body, attempt).await }
        })
        .await;

        let outcome = match result {
            Ok(reply) if reply.is_success() => SendOutcome::Accepted(reply),
            Ok(reply) => SendOutcome::Rejected(reply),
            Err(exhausted) => SendOutcome::from(exhausted),
        };

        match &outcome {
            SendOutcome::Accepted(_) => {
                info!(%operation, result_code = outcome.result_code(), "Authority accepted")
            }
            SendOutcome::Rejected(reply) => warn!(
                %operation,
                result_code = %reply.result_cd,
                result_message = %reply.result_msg,
                "Authority rejected"
            ),
            SendOutcome::TransportFailed {
                message, attempts, ..
            } => warn!(%operation, attempts, error = %message, "Authority unreachable"),
        }

        outcome
    }

    /// One POST. `Ok` means an envelope came back, whatever its code.
    async fn attempt(
        &self,
        operation: Operation,
        url: &str,
        body: &serde_json::Value,
        attempt: u32,
    ) -> Result<AuthorityReply, AttemptFailure> {
        debug!(%operation, attempt, "Authority request");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptFailure::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptFailure::Connection(e.to_string()))?;

        serde_json::from_slice::<AuthorityReply>(&bytes)
            .map_err(|e| AttemptFailure::Malformed(e.to_string()))
    }
}
