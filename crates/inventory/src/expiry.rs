use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use pharmatrack_core::{BatchId, ProductId};

use crate::batch::Batch;

/// One line of the expiry-risk report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub product_name: String,
    pub internal_batch_code: String,
    pub expiry_date: NaiveDate,
    /// Negative once the batch is already past expiry.
    pub days_left: i64,
    pub quantity_remaining: i64,
}

/// Batches with stock expiring before `today + threshold_days`, soonest first.
///
/// Each batch comes paired with its product name. Already-expired stock is
/// included so it can be pulled from the shelf.
pub fn expiry_risk<'a>(
    batches: impl IntoIterator<Item = (&'a Batch, &'a str)>,
    today: NaiveDate,
    threshold_days: i64,
) -> Vec<ExpiryAlert> {
    let cutoff = today + Duration::days(threshold_days);
    let mut at_risk: Vec<(&Batch, &str)> = batches
        .into_iter()
        .filter(|(b, _)| b.quantity_remaining > 0 && b.expiry_date < cutoff)
        .collect();
    at_risk.sort_by_key(|(b, _)| b.fefo_key());

    at_risk
        .into_iter()
        .map(|(b, name)| ExpiryAlert {
            batch_id: b.id,
            product_id: b.product_id,
            product_name: name.to_string(),
            internal_batch_code: b.internal_batch_code.clone(),
            expiry_date: b.expiry_date,
            days_left: b.days_until_expiry(today),
            quantity_remaining: b.quantity_remaining,
        })
        .collect()
}
