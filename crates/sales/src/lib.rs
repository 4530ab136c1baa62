//! Sales domain module: the transaction ledger, sale/return/stock-in
//! requests, receipts and recall reminders.
//!
//! This crate contains business rules for recording stock movements,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod receipt;
pub mod recall;
pub mod request;
pub mod transaction;

pub use receipt::{
    return_outcome, sale_transactions, LedgerEntry, ReturnOutcome, ReturnReceipt, SaleReceipt,
    StockInReceipt,
};
pub use recall::{safety_reminders, SafetyReminder};
pub use request::{ReturnRequest, SaleRequest, StockInRequest};
pub use transaction::{ensure_unit_price, net_sold, Transaction, TransactionType, MAX_UNIT_PRICE};
