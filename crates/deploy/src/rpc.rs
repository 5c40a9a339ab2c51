//! JSON-RPC transport for the ledger node.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Per-request timeout. Receipt confirmation is polled separately.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Error object returned by the node. `data` carries revert payloads on dev nodes.
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({data})")?;
        }
        Ok(())
    }
}

/// HTTP client used for every ledger request.
pub fn create_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Send one JSON-RPC request and decode its `result`.
///
/// A node-side error object becomes an error carrying its code and message.
/// A `null` result decodes only into types that accept it, such as `Option<T>`.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> anyhow::Result<T> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
        method,
        params,
    };

    tracing::trace!(method, id = request.id, "JSON-RPC request");

    let response: RpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    decode_response(method, response)
}

fn decode_response<T: DeserializeOwned>(method: &str, response: RpcResponse) -> anyhow::Result<T> {
    if let Some(error) = response.error {
        anyhow::bail!("{} failed: {}", method, error);
    }

    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Poll `check_fn` until it yields a value.
///
/// `Ok(None)` means "not yet"; errors are logged and polling continues until
/// `timeout` elapses.
///
/// # Arguments
/// * `name` - What is being waited for (for error messages)
/// * `timeout` - Maximum time to wait
/// * `interval` - Delay between two checks
/// * `check_fn` - Function that returns `Ok(Some(_))` once the value is available
pub async fn poll_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    interval: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, anyhow::Error>>,
{
    let start = std::time::Instant::now();

    loop {
        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                tracing::trace!(target_name = %name, "Not available yet, polling...");
            }
            Err(e) => {
                tracing::trace!(error = %e, target_name = %name, "Check failed, polling...");
            }
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {}", name);
        }

        tokio::time::sleep(interval).await;
    }
}
