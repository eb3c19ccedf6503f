//! HTTP decision oracle.
//!
//! POSTs the [`OracleRequest`] as JSON to a single endpoint and hands the
//! body back untouched. A body that is not JSON is passed on as a string so
//! the parsing boundary can look for an embedded document (LLM prose around
//! a JSON block).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::application::ports::{DecisionOracle, OracleError, OracleProposal, OracleRequest};

const MAX_ERROR_BODY: usize = 512;

/// Oracle endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOracleConfig {
    /// Full URL of the decision endpoint.
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

/// `DecisionOracle` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDecisionOracle {
    client: Client,
    config: HttpOracleConfig,
}

impl HttpDecisionOracle {
    /// Build the client.
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("trade-guard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OracleError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn transport_error(&self, e: &reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout {
                elapsed: self.config.timeout,
            }
        } else {
            OracleError::Transport {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DecisionOracle for HttpDecisionOracle {
    async fn propose(&self, request: &OracleRequest) -> Result<OracleProposal, OracleError> {
        let mut call = self.client.post(&self.config.endpoint).json(request);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        tracing::debug!(
            cycle_id = %request.context.cycle_id,
            status = status.as_u16(),
            "Oracle responded"
        );
        Ok(OracleProposal::new(body))
    }
}
