//! Minimal Ethereum JSON-RPC transport.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error object of a JSON-RPC response.
#[derive(Debug, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct JsonRpc {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpc {
    pub fn new(url: Url, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// An `error` member in the response is returned as an [`RpcError`] so callers can
    /// tell node-side rejections apart from transport failures.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(method, id, "Sending RPC request");

        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request"))?;

        let mut body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(error) = body
            .get_mut("error")
            .map(Value::take)
            .filter(|e| !e.is_null())
        {
            let error: RpcError = serde_json::from_value(error)
                .with_context(|| format!("Malformed error in {method} response"))?;
            return Err(anyhow::Error::new(error).context(format!("{method} rejected")));
        }

        let result = body
            .get_mut("result")
            .map(Value::take)
            .with_context(|| format!("No result in {method} response"))?;

        serde_json::from_value(result)
            .with_context(|| format!("Failed to deserialize {method} result"))
    }
}
