use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Message for one customer who bought from a batch under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyReminder {
    pub customer_phone: String,
    pub internal_batch_code: String,
    pub expiry_date: NaiveDate,
    pub message: String,
}

/// One reminder per distinct contact, sorted by phone.
///
/// Blank contacts are dropped.
pub fn safety_reminders<'a>(
    internal_batch_code: &str,
    expiry_date: NaiveDate,
    contacts: impl IntoIterator<Item = &'a str>,
) -> Vec<SafetyReminder> {
    let phones: BTreeSet<&str> = contacts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    phones
        .into_iter()
        .map(|phone| SafetyReminder {
            customer_phone: phone.to_string(),
            internal_batch_code: internal_batch_code.to_string(),
            expiry_date,
            message: format!(
                "Hello! Safety Reminder from PharmaTrack. The medicine you purchased \
                 (Batch {internal_batch_code}) will expire on {expiry_date}. Please check your cabinet!"
            ),
        })
        .collect()
}
