//! Event-to-action translation
//!
//! One translation method per loan event kind. Each validates its
//! input, builds exactly one [`Action`] for the opposite chain and
//! enqueues it. Malformed input fails with a validation error and is
//! never enqueued.

use relay_core::types::{
    Action, ActionArgs, ChainId, EventPayload, LoanRepayment, LoanRequest, RawEvent,
};
use relay_core::{Error, Result};
use retry_queue::RetryQueue;
use tracing::info;
use uuid::Uuid;

/// Translates loan events between the collateral and loan chains
///
/// Origin-chain events (`LoanRequested`, `LoanFunded`) become loan-chain
/// actions; loan-chain events (`LoanRepaid`, `LoanLiquidated`) become
/// origin-chain actions. The manager holds no chain clients and has no
/// side effects beyond enqueueing.
pub struct CrossChainManager {
    origin_chain: ChainId,
    loan_chain: ChainId,
    queue: RetryQueue,
}

impl CrossChainManager {
    /// Create a manager bridging `origin_chain` and `loan_chain`
    pub fn new(origin_chain: ChainId, loan_chain: ChainId, queue: RetryQueue) -> Self {
        Self {
            origin_chain,
            loan_chain,
            queue,
        }
    }

    /// A loan was requested on the origin chain: issue it on the loan chain
    pub async fn on_loan_requested(&self, event: &RawEvent) -> Result<Uuid> {
        self.expect_source(event, self.origin_chain)?;
        let request = match &event.payload {
            EventPayload::LoanRequested(request) => request.clone(),
            other => return Err(wrong_payload("LoanRequested", other)),
        };
        validate_request(&request)?;

        info!(
            borrower = %request.borrower,
            amount = request.amount,
            tx_hash = %event.tx_hash,
            "Relaying loan request"
        );

        let action = Action::new(event.key(), self.loan_chain, ActionArgs::RequestLoan(request));
        self.queue.enqueue(action).await
    }

    /// Collateral was locked on the origin chain: mark the loan funded
    pub async fn on_loan_funded(&self, event: &RawEvent) -> Result<Uuid> {
        self.expect_source(event, self.origin_chain)?;
        let funding = match &event.payload {
            EventPayload::LoanFunded(funding) => funding.clone(),
            other => return Err(wrong_payload("LoanFunded", other)),
        };

        info!(
            borrower = %funding.borrower,
            tx_hash = %event.tx_hash,
            "Relaying loan funding"
        );

        let action = Action::new(event.key(), self.loan_chain, ActionArgs::FundLoan(funding));
        self.queue.enqueue(action).await
    }

    /// The loan was repaid on the loan chain: release collateral
    pub async fn on_loan_repaid(&self, event: &RawEvent) -> Result<Uuid> {
        self.expect_source(event, self.loan_chain)?;
        let repayment = match &event.payload {
            EventPayload::LoanRepaid(repayment) => repayment.clone(),
            other => return Err(wrong_payload("LoanRepaid", other)),
        };
        validate_repayment(&repayment)?;

        info!(
            borrower = %repayment.borrower,
            amount = repayment.amount,
            tx_hash = %event.tx_hash,
            "Relaying loan repayment"
        );

        let action = Action::new(event.key(), self.origin_chain, ActionArgs::RepayLoan(repayment));
        self.queue.enqueue(action).await
    }

    /// The loan defaulted on the loan chain: liquidate collateral
    pub async fn on_loan_liquidated(&self, event: &RawEvent) -> Result<Uuid> {
        self.expect_source(event, self.loan_chain)?;
        let liquidation = match &event.payload {
            EventPayload::LoanLiquidated(liquidation) => liquidation.clone(),
            other => return Err(wrong_payload("LoanLiquidated", other)),
        };

        info!(
            borrower = %liquidation.borrower,
            tx_hash = %event.tx_hash,
            "Relaying loan liquidation"
        );

        let action = Action::new(
            event.key(),
            self.origin_chain,
            ActionArgs::LiquidateLoan(liquidation),
        );
        self.queue.enqueue(action).await
    }

    fn expect_source(&self, event: &RawEvent, expected: ChainId) -> Result<()> {
        if event.chain_id != expected {
            return Err(Error::Validation(format!(
                "event {} observed on {}, expected {}",
                event.event_name, event.chain_id, expected
            )));
        }
        Ok(())
    }
}

fn wrong_payload(expected: &str, got: &EventPayload) -> Error {
    Error::Validation(format!(
        "expected {} payload, got {}",
        expected,
        got.event_name()
    ))
}

fn validate_request(request: &LoanRequest) -> Result<()> {
    if request.borrower.is_empty() {
        return Err(Error::Validation("empty borrower address".to_string()));
    }
    if request.amount == 0 {
        return Err(Error::Validation("zero loan amount".to_string()));
    }
    if request.duration_days == 0 {
        return Err(Error::Validation("zero loan duration".to_string()));
    }
    Ok(())
}

fn validate_repayment(repayment: &LoanRepayment) -> Result<()> {
    if repayment.borrower.is_empty() {
        return Err(Error::Validation("empty borrower address".to_string()));
    }
    if repayment.amount == 0 {
        return Err(Error::Validation("zero repayment amount".to_string()));
    }
    Ok(())
}
