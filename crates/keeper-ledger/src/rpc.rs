//! JSON-RPC 2.0 client for the ledger gateway.
//!
//! The gateway exposes contract calls as JSON-RPC methods over HTTPS and
//! signs writes with the treasury key. Writes answer with a transaction hash;
//! the client then polls `getTransactionReceipt` until the receipt appears or
//! the confirmation timeout elapses. Both the per-request timeout and the
//! confirmation timeout are constructor parameters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use keeper_types::units::amount_str;
use keeper_types::{Address, RoleId, TxHash, TxReceipt};

use crate::ledger::{AprInfo, AprUpdate, Ledger};
use crate::{LedgerError, Result};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for a write to be confirmed.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default receipt polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC request.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: &'static str,
    /// Request ID.
    pub id: u64,
    /// Method name.
    pub method: &'a str,
    /// Parameters.
    pub params: Value,
}

/// JSON-RPC response.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// Request ID echoed back.
    #[serde(default)]
    pub id: Value,
    /// Result on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Whether a call mutates ledger state; decides how an error object maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
}

/// Suspend-point limits for ledger calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcTimeouts {
    /// Bound on each HTTP exchange.
    pub request: Duration,
    /// Bound on waiting for a write's receipt.
    pub confirmation: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST_TIMEOUT,
            confirmation: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Contract and signer addresses the calls are addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contracts {
    /// Staking vault (APR state, roles).
    pub vault: Address,
    /// Reward token.
    pub token: Address,
    /// Treasury wallet that pays distributions.
    pub treasury: Address,
}

/// Result shape of a write: either a bare hash string or `{ "txHash": … }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Submitted {
    Hash(TxHash),
    Object {
        #[serde(rename = "txHash")]
        tx_hash: TxHash,
    },
}

/// Bare amount result (string or integer).
#[derive(Deserialize)]
#[serde(transparent)]
struct Amount(#[serde(with = "amount_str")] u128);

/// [`Ledger`] implementation backed by a JSON-RPC gateway.
pub struct RpcLedger {
    client: reqwest::Client,
    endpoint: String,
    contracts: Contracts,
    timeouts: RpcTimeouts,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unreachable`] if the HTTP client cannot be built
    pub fn new(
        endpoint: impl Into<String>,
        contracts: Contracts,
        timeouts: RpcTimeouts,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.request)
            .build()
            .map_err(|e| LedgerError::Unreachable {
                method: "connect".to_string(),
                detail: e.to_string(),
            })?;
        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, ?timeouts, "ledger client initialized");
        Ok(Self {
            client,
            endpoint,
            contracts,
            timeouts,
            next_id: AtomicU64::new(1),
        })
    }

    /// Addresses this client talks to.
    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        kind: CallKind,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(id, method, "→ rpc");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Unreachable {
                method: method.to_string(),
                detail: format!("HTTP {status}"),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        if let Some(error) = body.error {
            warn!(id, method, code = error.code, message = %error.message, "← rpc error");
            return Err(match kind {
                CallKind::Read => LedgerError::Protocol {
                    method: method.to_string(),
                    detail: format!("code {}: {}", error.code, error.message),
                },
                CallKind::Write => LedgerError::Rejected {
                    method: method.to_string(),
                    code: error.code,
                    message: error.message,
                },
            });
        }

        let result = body.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| LedgerError::Protocol {
            method: method.to_string(),
            detail: format!("unexpected result: {e}"),
        })
    }

    fn transport_error(&self, method: &str, e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::Timeout {
                method: method.to_string(),
                after_secs: self.timeouts.request.as_secs(),
            }
        } else if e.is_decode() {
            LedgerError::Protocol {
                method: method.to_string(),
                detail: e.to_string(),
            }
        } else {
            LedgerError::Unreachable {
                method: method.to_string(),
                detail: e.to_string(),
            }
        }
    }

    /// Submit a write and block until its receipt is available.
    async fn submit(&self, method: &str, params: Value) -> Result<TxReceipt> {
        let submitted: Submitted = self.call(method, params, CallKind::Write).await?;
        let tx_hash = match submitted {
            Submitted::Hash(h) | Submitted::Object { tx_hash: h } => h,
        };
        info!(method, tx_hash = %tx_hash, "transaction submitted, awaiting confirmation");

        let receipt = tokio::time::timeout(self.timeouts.confirmation, self.poll_receipt(&tx_hash))
            .await
            .map_err(|_| LedgerError::ConfirmationTimeout {
                tx_hash: tx_hash.clone(),
                after_secs: self.timeouts.confirmation.as_secs(),
            })?
            .map_err(|e| {
                warn!(
                    method,
                    tx_hash = %tx_hash,
                    error = %e,
                    "receipt lookup failed after submission, outcome unknown"
                );
                LedgerError::ReceiptUnavailable {
                    tx_hash: tx_hash.clone(),
                    source: Box::new(e),
                }
            })?;

        if !receipt.succeeded() {
            return Err(LedgerError::Reverted {
                tx_hash,
                reason: receipt
                    .revert_reason
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
        info!(
            method,
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            "transaction confirmed"
        );
        Ok(receipt)
    }

    async fn poll_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        loop {
            let receipt: Option<TxReceipt> = self
                .call(
                    "getTransactionReceipt",
                    json!({ "txHash": tx_hash }),
                    CallKind::Read,
                )
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(self.timeouts.poll_interval).await;
        }
    }
}

impl Ledger for RpcLedger {
    async fn balance_of(&self, account: &Address) -> Result<u128> {
        let amount: Amount = self
            .call(
                "balanceOf",
                json!({ "token": self.contracts.token, "account": account }),
                CallKind::Read,
            )
            .await?;
        Ok(amount.0)
    }

    async fn apr_info(&self) -> Result<AprInfo> {
        self.call(
            "getAPRInfo",
            json!({ "vault": self.contracts.vault }),
            CallKind::Read,
        )
        .await
    }

    async fn adjust_apr(&self, update: &AprUpdate) -> Result<TxReceipt> {
        self.submit(
            "adjustAPR",
            json!({
                "vault": self.contracts.vault,
                "newAPR": update.new_apr_bps,
                "nextAdjustmentTime": update.next_adjustment_time,
            }),
        )
        .await
    }

    async fn transfer(&self, to: &Address, amount: u128) -> Result<TxReceipt> {
        self.submit(
            "transfer",
            json!({
                "token": self.contracts.token,
                "from": self.contracts.treasury,
                "to": to,
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn has_role(&self, role: &RoleId, account: &Address) -> Result<bool> {
        self.call(
            "hasRole",
            json!({ "contract": self.contracts.vault, "role": role, "account": account }),
            CallKind::Read,
        )
        .await
    }

    async fn grant_role(&self, role: &RoleId, account: &Address) -> Result<TxReceipt> {
        self.submit(
            "grantRole",
            json!({ "contract": self.contracts.vault, "role": role, "account": account }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts() -> Contracts {
        Contracts {
            vault: "0x1111111111111111111111111111111111111111".parse().expect("vault"),
            token: "0x2222222222222222222222222222222222222222".parse().expect("token"),
            treasury: "0x3333333333333333333333333333333333333333".parse().expect("treasury"),
        }
    }

    #[test]
    fn test_request_envelope() {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "getAPRInfo",
            params: json!({ "vault": contracts().vault }),
        };
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["params"]["vault"], "0x1111111111111111111111111111111111111111");
    }

    #[test]
    fn test_response_with_error_object() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#;
        let resp: RpcResponse = serde_json::from_str(raw).expect("parse");
        assert!(resp.result.is_none());
        let err = resp.error.expect("error object");
        assert_eq!(err.code, -32000);
    }

    #[test]
    fn test_submitted_shapes() {
        let bare: Submitted = serde_json::from_value(json!("0xabc")).expect("bare");
        let obj: Submitted = serde_json::from_value(json!({ "txHash": "0xdef" })).expect("object");
        assert!(matches!(bare, Submitted::Hash(h) if h == "0xabc"));
        assert!(matches!(obj, Submitted::Object { tx_hash } if tx_hash == "0xdef"));
    }

    #[test]
    fn test_amount_result_shapes() {
        let from_str: Amount =
            serde_json::from_value(json!("1000000000000000000000")).expect("str");
        assert_eq!(from_str.0, 1_000_000_000_000_000_000_000);
        let from_int: Amount = serde_json::from_value(json!(42)).expect("int");
        assert_eq!(from_int.0, 42);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_class() {
        let timeouts = RpcTimeouts {
            request: Duration::from_millis(500),
            ..RpcTimeouts::default()
        };
        // Port 9 (discard) on localhost is not an HTTP server.
        let ledger = RpcLedger::new("http://127.0.0.1:9", contracts(), timeouts).expect("client");
        let err = ledger.apr_info().await.expect_err("no server");
        assert_eq!(err.class(), keeper_types::ErrorClass::Network);
    }

    type Calls = std::sync::Arc<std::sync::Mutex<Vec<String>>>;

    /// Local HTTP gateway answering each request with the next scripted
    /// JSON-RPC body. Returns the endpoint and the methods it was called with.
    async fn gateway(bodies: Vec<Value>) -> (String, Calls) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let endpoint = format!("http://{}", listener.local_addr().expect("local addr"));
        let methods = Calls::default();
        let seen = methods.clone();

        tokio::spawn(async move {
            for body in bodies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let request: Value = loop {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break Value::Null;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                        continue;
                    };
                    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break serde_json::from_slice(&buf[end + 4..end + 4 + len])
                            .unwrap_or(Value::Null);
                    }
                };
                if let Some(method) = request["method"].as_str() {
                    seen.lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(method.to_string());
                }

                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (endpoint, methods)
    }

    fn ledger_at(endpoint: &str) -> RpcLedger {
        let timeouts = RpcTimeouts {
            request: Duration::from_secs(5),
            confirmation: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        };
        RpcLedger::new(endpoint, contracts(), timeouts).expect("client")
    }

    fn called(methods: &std::sync::Mutex<Vec<String>>) -> Vec<String> {
        methods.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    const PAYEE: Address = Address::new([0x44; 20]);

    #[tokio::test]
    async fn test_balance_decodes_string_result() {
        let (endpoint, methods) = gateway(vec![
            json!({ "jsonrpc": "2.0", "id": 1, "result": "1000000000000000000000" }),
        ])
        .await;
        let balance = ledger_at(&endpoint).balance_of(&PAYEE).await.expect("balance");
        assert_eq!(balance, 1_000_000_000_000_000_000_000);
        assert_eq!(called(&methods), vec!["balanceOf"]);
    }

    #[tokio::test]
    async fn test_read_error_object_is_network_class() {
        let (endpoint, _) = gateway(vec![json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "method not found" }
        })])
        .await;
        let err = ledger_at(&endpoint).apr_info().await.expect_err("error object");
        assert!(matches!(err, LedgerError::Protocol { .. }));
        assert_eq!(err.class(), keeper_types::ErrorClass::Network);
    }

    #[tokio::test]
    async fn test_write_error_object_is_rejected() {
        let (endpoint, methods) = gateway(vec![json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "execution reverted: paused" }
        })])
        .await;
        let err = ledger_at(&endpoint)
            .transfer(&PAYEE, 500)
            .await
            .expect_err("rejected");
        assert!(matches!(err, LedgerError::Rejected { code: -32000, .. }));
        assert_eq!(err.class(), keeper_types::ErrorClass::TransactionFailure);
        // No receipt is polled for a write that was never accepted.
        assert_eq!(called(&methods), vec!["transfer"]);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_transaction_failure() {
        let (endpoint, _) = gateway(vec![
            json!({ "jsonrpc": "2.0", "id": 1, "result": "0xabc" }),
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {
                    "txHash": "0xabc",
                    "status": "reverted",
                    "blockNumber": 7,
                    "revertReason": "ERC20: transfer amount exceeds balance"
                }
            }),
        ])
        .await;
        let err = ledger_at(&endpoint)
            .transfer(&PAYEE, 500)
            .await
            .expect_err("reverted");
        assert!(matches!(
            &err,
            LedgerError::Reverted { tx_hash, reason }
                if tx_hash == "0xabc" && reason.contains("exceeds balance")
        ));
        assert_eq!(err.class(), keeper_types::ErrorClass::TransactionFailure);
    }

    #[tokio::test]
    async fn test_pending_receipt_is_polled_again() {
        let (endpoint, methods) = gateway(vec![
            json!({ "jsonrpc": "2.0", "id": 1, "result": { "txHash": "0xdef" } }),
            json!({ "jsonrpc": "2.0", "id": 2, "result": null }),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "result": { "txHash": "0xdef", "status": "success", "blockNumber": 7 }
            }),
        ])
        .await;
        let receipt = ledger_at(&endpoint)
            .transfer(&PAYEE, 500)
            .await
            .expect("confirmed");
        assert_eq!(receipt.tx_hash, "0xdef");
        assert_eq!(receipt.block_number, Some(7));
        assert_eq!(
            called(&methods),
            vec!["transfer", "getTransactionReceipt", "getTransactionReceipt"]
        );
    }

    #[tokio::test]
    async fn test_receipt_read_failure_names_submitted_hash() {
        let (endpoint, _) = gateway(vec![
            json!({ "jsonrpc": "2.0", "id": 1, "result": "0x123" }),
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "error": { "code": -32603, "message": "internal error" }
            }),
        ])
        .await;
        let err = ledger_at(&endpoint)
            .transfer(&PAYEE, 500)
            .await
            .expect_err("receipt unavailable");
        assert!(matches!(
            &err,
            LedgerError::ReceiptUnavailable { tx_hash, .. } if tx_hash == "0x123"
        ));
        assert_eq!(err.class(), keeper_types::ErrorClass::Network);
        assert!(err.to_string().contains("0x123"));
    }
}
