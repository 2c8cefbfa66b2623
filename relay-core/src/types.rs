//! Shared types for the loan relay
//!
//! Raw chain logs are parsed into [`EventPayload`] exactly once, at the
//! watcher boundary. Everything downstream of the router works with
//! typed fields only.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Numeric chain identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChainId(pub u64);

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

/// Global natural key of an observed event
///
/// `(chain_id, tx_hash, log_index)` uniquely identifies a log entry
/// across all monitored chains and is the basis for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Source chain
    pub chain_id: ChainId,
    /// Transaction hash on the source chain
    pub tx_hash: String,
    /// Position of the log within the transaction
    pub log_index: u32,
}

/// A normalized event observed on a chain
///
/// Immutable once emitted by a watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Source chain
    pub chain_id: ChainId,
    /// Emitting contract
    pub contract_address: String,
    /// Event name (e.g. `LoanRequested`)
    pub event_name: String,
    /// Transaction hash
    pub tx_hash: String,
    /// Log index within the transaction
    pub log_index: u32,
    /// Block the event was included in
    pub block_number: u64,
    /// Typed payload
    pub payload: EventPayload,
}

impl RawEvent {
    /// Natural key of this event
    pub fn key(&self) -> EventKey {
        EventKey {
            chain_id: self.chain_id,
            tx_hash: self.tx_hash.clone(),
            log_index: self.log_index,
        }
    }
}

/// Loan request parameters (origin chain → loan chain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Borrower address on the origin chain
    pub borrower: String,
    /// Requested principal, smallest unit
    pub amount: u128,
    /// Interest rate in basis points
    pub interest_rate: u64,
    /// Loan duration in days
    pub duration_days: u64,
    /// Off-chain credit score forwarded with the request
    pub credit_score: u64,
}

/// Loan funding parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFunding {
    /// Borrower address
    pub borrower: String,
}

/// Loan repayment parameters (loan chain → origin chain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRepayment {
    /// Borrower address
    pub borrower: String,
    /// Repaid amount, smallest unit
    pub amount: u128,
}

/// Loan liquidation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLiquidation {
    /// Borrower address
    pub borrower: String,
}

/// Typed event payload, keyed by event name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A loan was requested on the origin chain
    LoanRequested(LoanRequest),
    /// Collateral was locked and the loan initiated on the origin chain
    LoanFunded(LoanFunding),
    /// The loan was fully repaid on the loan chain
    LoanRepaid(LoanRepayment),
    /// The loan was liquidated on the loan chain
    LoanLiquidated(LoanLiquidation),
}

impl EventPayload {
    /// Event name this payload corresponds to
    pub fn event_name(&self) -> &'static str {
        match self {
            EventPayload::LoanRequested(_) => "LoanRequested",
            EventPayload::LoanFunded(_) => "LoanFunded",
            EventPayload::LoanRepaid(_) => "LoanRepaid",
            EventPayload::LoanLiquidated(_) => "LoanLiquidated",
        }
    }

    /// Parse raw log arguments into a typed payload
    ///
    /// Numeric fields accept both JSON numbers and decimal strings,
    /// since RPC layers emit either depending on the chain. Unknown
    /// event names and malformed fields fail with
    /// [`Error::Validation`].
    pub fn parse(event_name: &str, args: &Value) -> Result<Self> {
        match event_name {
            "LoanRequested" => Ok(EventPayload::LoanRequested(LoanRequest {
                borrower: address_field(args, "user")?,
                amount: u128_field(args, "loanAmount")?,
                interest_rate: u64_field(args, "interestRate")?,
                duration_days: u64_field(args, "durationInDays")?,
                credit_score: u64_field(args, "creditScore")?,
            })),
            "LoanFunded" => Ok(EventPayload::LoanFunded(LoanFunding {
                borrower: address_field(args, "user")?,
            })),
            "LoanRepaid" => Ok(EventPayload::LoanRepaid(LoanRepayment {
                borrower: address_field(args, "borrower")?,
                amount: u128_field(args, "amount")?,
            })),
            "LoanLiquidated" => Ok(EventPayload::LoanLiquidated(LoanLiquidation {
                borrower: address_field(args, "borrower")?,
            })),
            other => Err(Error::Validation(format!("unknown event name: {}", other))),
        }
    }
}

fn address_field(args: &Value, name: &str) -> Result<String> {
    let value = args
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation(format!("missing field: {}", name)))?;
    if value.is_empty() {
        return Err(Error::Validation(format!("empty address field: {}", name)));
    }
    Ok(value.to_string())
}

fn u128_field(args: &Value, name: &str) -> Result<u128> {
    numeric_field(args, name)
}

fn u64_field(args: &Value, name: &str) -> Result<u64> {
    let value: u128 = numeric_field(args, name)?;
    u64::try_from(value)
        .map_err(|_| Error::Validation(format!("field {} out of range: {}", name, value)))
}

fn numeric_field(args: &Value, name: &str) -> Result<u128> {
    let value = args
        .get(name)
        .ok_or_else(|| Error::Validation(format!("missing field: {}", name)))?;

    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| Error::Validation(format!("field {} is not a non-negative integer", name))),
        Value::String(s) => s
            .parse::<u128>()
            .map_err(|_| Error::Validation(format!("field {} does not parse as integer: {}", name, s))),
        _ => Err(Error::Validation(format!(
            "field {} has unsupported type",
            name
        ))),
    }
}

/// Destination-chain entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entrypoint {
    /// Issue a loan on the loan chain
    RequestLoan,
    /// Mark a loan as funded on the loan chain
    FundLoan,
    /// Release collateral on the origin chain after repayment
    RepayLoan,
    /// Liquidate collateral on the origin chain
    LiquidateLoan,
}

impl Entrypoint {
    /// Wire name of the entrypoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Entrypoint::RequestLoan => "request_loan",
            Entrypoint::FundLoan => "fund_loan",
            Entrypoint::RepayLoan => "repay_loan",
            Entrypoint::LiquidateLoan => "liquidate_loan",
        }
    }
}

impl std::fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed arguments for a destination-chain call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionArgs {
    /// Arguments for `request_loan`
    RequestLoan(LoanRequest),
    /// Arguments for `fund_loan`
    FundLoan(LoanFunding),
    /// Arguments for `repay_loan`
    RepayLoan(LoanRepayment),
    /// Arguments for `liquidate_loan`
    LiquidateLoan(LoanLiquidation),
}

impl ActionArgs {
    /// Entrypoint these arguments belong to
    pub fn entrypoint(&self) -> Entrypoint {
        match self {
            ActionArgs::RequestLoan(_) => Entrypoint::RequestLoan,
            ActionArgs::FundLoan(_) => Entrypoint::FundLoan,
            ActionArgs::RepayLoan(_) => Entrypoint::RepayLoan,
            ActionArgs::LiquidateLoan(_) => Entrypoint::LiquidateLoan,
        }
    }
}

/// A destination-chain call derived from a source event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action ID
    pub id: Uuid,
    /// Natural key of the triggering event
    pub source: EventKey,
    /// Chain the call targets
    pub target_chain: ChainId,
    /// Contract entrypoint
    pub entrypoint: Entrypoint,
    /// Typed call arguments
    pub args: ActionArgs,
    /// Deterministic key preventing duplicate execution
    pub idempotency_key: String,
}

impl Action {
    /// Build an action from its triggering event
    ///
    /// The idempotency key derives from the event's natural key plus
    /// the entrypoint, so re-processing the same source event always
    /// yields the same key.
    pub fn new(source: EventKey, target_chain: ChainId, args: ActionArgs) -> Self {
        let entrypoint = args.entrypoint();
        let idempotency_key = idempotency_key(&source, entrypoint);

        Self {
            id: Uuid::new_v4(),
            source,
            target_chain,
            entrypoint,
            args,
            idempotency_key,
        }
    }
}

/// Derive the idempotency key for `(source event, entrypoint)`
pub fn idempotency_key(source: &EventKey, entrypoint: Entrypoint) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&source.chain_id.0.to_be_bytes());
    hasher.update(b"|");
    hasher.update(source.tx_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(&source.log_index.to_be_bytes());
    hasher.update(b"|");
    hasher.update(entrypoint.as_str().as_bytes());
    hasher.finalize().to_hex().to_string()
}
