use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmatrack_core::{BatchId, DomainError, DomainResult, ProductId, Quantity};
use pharmatrack_inventory::{AllocationLine, AllocationPlan, Batch};

use crate::transaction::{Transaction, TransactionType};

/// One SALE record per allocation line, each carrying its own batch and
/// `unit_price × line quantity`.
pub fn sale_transactions(
    plan: &AllocationPlan,
    unit_price: Decimal,
    customer_phone: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<Transaction>> {
    plan.lines
        .iter()
        .map(|line| {
            Transaction::record(
                TransactionType::Sale,
                plan.product_id,
                Some(line.batch_id),
                line.quantity,
                unit_price,
                occurred_at,
                customer_phone.map(str::to_string),
            )
        })
        .collect()
}

/// Outcome of a committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub lines: Vec<AllocationLine>,
    pub transactions: Vec<Transaction>,
    /// Expired batches skipped while planning; candidates for removal.
    pub expired_batches: Vec<BatchId>,
}

impl SaleReceipt {
    pub fn new(plan: AllocationPlan, unit_price: Decimal, transactions: Vec<Transaction>) -> Self {
        let total_amount = transactions.iter().map(|t| t.total_amount).sum();
        Self {
            product_id: plan.product_id,
            quantity: plan.requested.get(),
            unit_price,
            total_amount,
            lines: plan.lines,
            transactions,
            expired_batches: plan.expired_batches,
        }
    }
}

/// What happened to returned goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOutcome {
    /// Put back into the (still active) batch.
    Restocked,
    /// Batch is depleted or expired; goods set aside, stock unchanged.
    Quarantined,
}

/// Decide what a return does to `batch`.
///
/// `net_sold` is Σ SALE − Σ RETURN already recorded against the batch; a
/// return beyond it is an invariant violation. Only a batch that is still
/// active on `on` takes the goods back.
pub fn return_outcome(
    batch: &Batch,
    net_sold: i64,
    quantity: Quantity,
    on: NaiveDate,
) -> DomainResult<ReturnOutcome> {
    if quantity.get() > net_sold {
        return Err(DomainError::invariant(format!(
            "cannot return {quantity} unit(s) to batch {}: only {net_sold} sold",
            batch.internal_batch_code
        )));
    }
    if batch.is_eligible_on(on) {
        Ok(ReturnOutcome::Restocked)
    } else {
        Ok(ReturnOutcome::Quarantined)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub outcome: ReturnOutcome,
    pub internal_batch_code: String,
    pub quantity_remaining: i64,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInReceipt {
    pub batch: Batch,
    pub transaction: Transaction,
}

/// Ledger row joined with the names a human needs to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub product_name: String,
    pub internal_batch_code: Option<String>,
}
