//! JSON-RPC ledger collaborator.
//!
//! Sends transactions from an unlocked node account with `eth_sendTransaction`
//! and waits for their receipts. Every transaction is sent exactly once;
//! only the receipt lookup is polled.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, keccak256},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{ComponentDeployer, ComponentInvoker, DeployRequest, Token, rpc};

/// Default time to wait for a transaction receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default delay between two receipt lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: String,
    /// Absent on pre-Byzantium chains.
    status: Option<String>,
    contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == "0x1")
    }
}

/// Ledger reached over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcLedger {
    client: reqwest::Client,
    url: Url,
    from: Address,
    artifacts_dir: PathBuf,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl RpcLedger {
    /// Connect to the node at `url`.
    ///
    /// When `from` is not given, the first unlocked account of the node is used.
    pub async fn connect(url: Url, from: Option<Address>, artifacts_dir: PathBuf) -> Result<Self> {
        let client = rpc::create_client()?;

        let from = match from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no unlocked accounts")?
            }
        };

        tracing::info!(rpc_url = %url, from = %from, "Connected to ledger");

        Ok(Self {
            client,
            url,
            from,
            artifacts_dir,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn send_transaction(&self, to: Option<Address>, data: Vec<u8>) -> Result<TransactionReceipt> {
        let mut tx = serde_json::json!({
            "from": self.from,
            "data": format!("0x{}", hex::encode(&data)),
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let tx_hash: String =
            rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_sendTransaction", vec![tx])
                .await
                .context("Failed to send transaction")?;

        tracing::debug!(tx_hash = %tx_hash, "Transaction sent, waiting for receipt");

        let client = &self.client;
        let url = self.url.as_str();
        let params = vec![serde_json::json!(tx_hash)];
        let receipt: TransactionReceipt = rpc::poll_until(
            &format!("receipt of {}", tx_hash),
            self.receipt_timeout,
            self.poll_interval,
            move || {
                rpc::json_rpc_call::<Option<TransactionReceipt>>(
                    client,
                    url,
                    "eth_getTransactionReceipt",
                    params.clone(),
                )
            },
        )
        .await?;

        if !receipt.succeeded() {
            anyhow::bail!("Transaction {} reverted", receipt.transaction_hash);
        }

        Ok(receipt)
    }
}

impl ComponentDeployer for RpcLedger {
    async fn deploy(&self, request: &DeployRequest) -> Result<Address> {
        let mut data = load_bytecode(&self.artifacts_dir, &request.artifact)?;
        data.extend(encode_args(&request.args));

        let receipt = self
            .send_transaction(None, data)
            .await
            .with_context(|| format!("Deployment transaction for {} failed", request.component))?;

        receipt.contract_address.with_context(|| {
            format!(
                "Receipt {} carries no contract address",
                receipt.transaction_hash
            )
        })
    }
}

impl ComponentInvoker for RpcLedger {
    async fn invoke(&self, target: Address, operation: &str, args: &[Token]) -> Result<()> {
        let receipt = self
            .send_transaction(Some(target), encode_call(operation, args))
            .await
            .with_context(|| format!("Call to {} on {} failed", operation, target))?;

        tracing::debug!(
            operation = %operation,
            target = %target,
            tx_hash = %receipt.transaction_hash,
            "Call confirmed"
        );
        Ok(())
    }
}

/// Load creation bytecode from `<dir>/<artifact>.json`.
fn load_bytecode(dir: &Path, artifact: &str) -> Result<Vec<u8>> {
    let path = dir.join(format!("{}.json", artifact));
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    let json: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

    let bytecode = json["bytecode"]
        .as_str()
        .with_context(|| format!("No bytecode in artifact {}", path.display()))?;
    let bytes = hex::decode(bytecode.trim_start_matches("0x"))
        .with_context(|| format!("Invalid bytecode hex in artifact {}", path.display()))?;

    if bytes.is_empty() {
        anyhow::bail!("Artifact {} has empty bytecode", path.display());
    }
    Ok(bytes)
}

/// ABI-encode arguments as a parameter list.
fn encode_args(args: &[Token]) -> Vec<u8> {
    DynSolValue::Tuple(args.iter().map(Token::to_sol_value).collect()).abi_encode_params()
}

/// Calldata: 4-byte selector of `operation(types)` followed by the encoded arguments.
fn encode_call(operation: &str, args: &[Token]) -> Vec<u8> {
    let types: Vec<_> = args.iter().map(Token::sol_type).collect();
    let signature = format!("{}({})", operation, types.join(","));

    let mut data = keccak256(signature.as_bytes())[..4].to_vec();
    data.extend(encode_args(args));
    data
}
