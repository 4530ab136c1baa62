//! FEFO (First-Expire, First-Out) batch allocation.
//!
//! Planning is a pure function over a snapshot of a product's batches. The
//! storage layer is responsible for taking that snapshot and applying the plan
//! inside one atomic unit; [`AllocationPlan::apply_to`] is the in-process
//! version of that apply step.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pharmatrack_core::{BatchId, ProductId, Quantity};

use crate::batch::Batch;

/// One deduction of the plan: take `quantity` units from `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub batch_id: BatchId,
    pub internal_batch_code: String,
    pub expiry_date: NaiveDate,
    pub quantity: Quantity,
    /// Remaining quantity the plan was computed against.
    pub remaining_before: i64,
}

/// Ordered set of deductions satisfying one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub product_id: ProductId,
    pub requested: Quantity,
    pub sale_date: NaiveDate,
    pub lines: Vec<AllocationLine>,
    /// Batches that still hold stock but were skipped because they are past
    /// expiry on the sale date (input for expiry alerts).
    pub expired_batches: Vec<BatchId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("batch {batch_id} does not belong to product {product_id}")]
    ForeignBatch {
        product_id: ProductId,
        batch_id: BatchId,
    },

    #[error("batch {batch_id} changed since planning (planned against {expected}, found {found})")]
    StaleBatchState {
        batch_id: BatchId,
        expected: i64,
        found: i64,
    },
}

impl AllocationPlan {
    /// Sum of all line quantities; equals `requested` for every plan built by
    /// [`plan_fefo`].
    pub fn total(&self) -> i64 {
        self.lines
            .iter()
            .fold(0i64, |sum, l| sum.saturating_add(l.quantity.get()))
    }

    /// First (earliest-expiring) batch the sale draws from.
    pub fn primary_line(&self) -> Option<&AllocationLine> {
        self.lines.first()
    }

    /// Apply the plan to an in-memory batch set, all-or-nothing.
    ///
    /// Every line is checked before anything is mutated. A line whose batch is
    /// missing, or whose remaining quantity dropped below the planned
    /// deduction, fails the whole plan with `StaleBatchState`.
    pub fn apply_to(&self, batches: &mut [Batch]) -> Result<(), AllocationError> {
        let mut positions = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let pos = batches.iter().position(|b| b.id == line.batch_id);
            let found = pos.map(|p| batches[p].quantity_remaining).unwrap_or(0);
            match pos {
                Some(p) if found >= line.quantity.get() => positions.push(p),
                _ => {
                    return Err(AllocationError::StaleBatchState {
                        batch_id: line.batch_id,
                        expected: line.remaining_before,
                        found,
                    });
                }
            }
        }

        for (line, pos) in self.lines.iter().zip(positions) {
            batches[pos].quantity_remaining -= line.quantity.get();
        }
        Ok(())
    }
}

/// Build a FEFO allocation plan for `requested` units of `product_id`.
///
/// Eligible batches are those with stock that are not expired on `sale_date`,
/// taken in ascending expiry order (ties by creation time, then id). Each
/// batch is drained before the next one is touched. Fails with
/// `InsufficientStock` when the eligible total is short; the input is never
/// modified.
pub fn plan_fefo(
    product_id: ProductId,
    requested: Quantity,
    batches: &[Batch],
    sale_date: NaiveDate,
) -> Result<AllocationPlan, AllocationError> {
    if let Some(foreign) = batches.iter().find(|b| b.product_id != product_id) {
        return Err(AllocationError::ForeignBatch {
            product_id,
            batch_id: foreign.id,
        });
    }

    let mut ordered: Vec<&Batch> = batches.iter().filter(|b| b.quantity_remaining > 0).collect();
    ordered.sort_by_key(|b| b.fefo_key());

    let (expired, eligible): (Vec<&Batch>, Vec<&Batch>) =
        ordered.into_iter().partition(|b| b.is_expired_on(sale_date));

    // Saturating: only the comparison with `requested` matters.
    let available = eligible
        .iter()
        .fold(0i64, |sum, b| sum.saturating_add(b.quantity_remaining));
    if available < requested.get() {
        return Err(AllocationError::InsufficientStock {
            product_id,
            requested: requested.get(),
            available,
        });
    }

    let mut outstanding = requested.get();
    let mut lines = Vec::new();
    for batch in eligible {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(batch.quantity_remaining);
        // take > 0: eligible batches hold stock and outstanding > 0.
        let Ok(quantity) = Quantity::new(take) else {
            continue;
        };
        lines.push(AllocationLine {
            batch_id: batch.id,
            internal_batch_code: batch.internal_batch_code.clone(),
            expiry_date: batch.expiry_date,
            quantity,
            remaining_before: batch.quantity_remaining,
        });
        outstanding -= take;
    }

    Ok(AllocationPlan {
        product_id,
        requested,
        sale_date,
        lines,
        expired_batches: expired.into_iter().map(|b| b.id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn created(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn batch(product_id: ProductId, code: &str, expiry: NaiveDate, qty: i64, created_offset: i64) -> Batch {
        Batch {
            id: BatchId::new(),
            product_id,
            supplier_batch_number: None,
            internal_batch_code: code.to_string(),
            manufacture_date: None,
            expiry_date: expiry,
            quantity_remaining: qty,
            created_at: created(created_offset),
        }
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    /// Product P: Batch A (2025-01-01, 5), Batch B (2025-06-01, 10).
    fn scenario() -> (ProductId, Vec<Batch>) {
        let p = ProductId::new();
        let a = batch(p, "A", date(2025, 1, 1), 5, 0);
        let b = batch(p, "B", date(2025, 6, 1), 10, 1);
        // Deliberately out of FEFO order.
        (p, vec![b, a])
    }

    fn lines_by_code(plan: &AllocationPlan) -> Vec<(&str, i64)> {
        plan.lines
            .iter()
            .map(|l| (l.internal_batch_code.as_str(), l.quantity.get()))
            .collect()
    }

    fn remaining(batches: &[Batch], code: &str) -> i64 {
        batches
            .iter()
            .find(|b| b.internal_batch_code == code)
            .map(|b| b.quantity_remaining)
            .unwrap()
    }

    #[test]
    fn request_spanning_two_batches_drains_earliest_first() {
        let (p, mut batches) = scenario();
        let plan = plan_fefo(p, qty(8), &batches, date(2024, 12, 1)).unwrap();
        assert_eq!(lines_by_code(&plan), vec![("A", 5), ("B", 3)]);
        assert_eq!(plan.total(), 8);

        plan.apply_to(&mut batches).unwrap();
        assert_eq!(remaining(&batches, "A"), 0);
        assert_eq!(remaining(&batches, "B"), 7);
    }

    #[test]
    fn stock_sums_near_i64_max_do_not_overflow() {
        let p = ProductId::new();
        let mut batches = vec![
            batch(p, "BIG-1", date(2025, 1, 1), i64::MAX, 0),
            batch(p, "BIG-2", date(2025, 6, 1), i64::MAX, 1),
        ];

        let plan = plan_fefo(p, qty(1), &batches, date(2024, 12, 1)).unwrap();
        assert_eq!(lines_by_code(&plan), vec![("BIG-1", 1)]);
        plan.apply_to(&mut batches).unwrap();
        assert_eq!(remaining(&batches, "BIG-1"), i64::MAX - 1);

        let err = plan_fefo(p, qty(2), &[batch(p, "ONE", date(2025, 1, 1), 1, 0)], date(2024, 12, 1))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InsufficientStock { available: 1, .. }));
    }

    #[test]
    fn request_beyond_total_fails_without_mutation() {
        let (p, batches) = scenario();
        let before = batches.clone();
        let err = plan_fefo(p, qty(20), &batches, date(2024, 12, 1)).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                product_id: p,
                requested: 20,
                available: 15,
            }
        );
        assert_eq!(batches, before);
        assert_eq!(remaining(&batches, "A"), 5);
        assert_eq!(remaining(&batches, "B"), 10);
    }

    #[test]
    fn expired_batch_is_skipped_and_reported() {
        let (p, mut batches) = scenario();
        let a_id = batches.iter().find(|b| b.internal_batch_code == "A").unwrap().id;
        let plan = plan_fefo(p, qty(5), &batches, date(2025, 2, 1)).unwrap();
        assert_eq!(lines_by_code(&plan), vec![("B", 5)]);
        assert_eq!(plan.expired_batches, vec![a_id]);

        plan.apply_to(&mut batches).unwrap();
        assert_eq!(remaining(&batches, "B"), 5);
        assert_eq!(remaining(&batches, "A"), 5);
    }

    #[test]
    fn expired_stock_does_not_count_as_available() {
        let (p, batches) = scenario();
        let err = plan_fefo(p, qty(11), &batches, date(2025, 2, 1)).unwrap_err();
        assert!(matches!(err, AllocationError::InsufficientStock { available: 10, .. }));
    }

    #[test]
    fn batch_expiring_on_sale_date_is_still_sellable() {
        let (p, batches) = scenario();
        let plan = plan_fefo(p, qty(2), &batches, date(2025, 1, 1)).unwrap();
        assert_eq!(lines_by_code(&plan), vec![("A", 2)]);
    }

    #[test]
    fn depleted_batch_is_never_selected() {
        let p = ProductId::new();
        let batches = vec![
            batch(p, "EMPTY", date(2024, 6, 1), 0, 0),
            batch(p, "FULL", date(2025, 6, 1), 4, 1),
        ];
        let plan = plan_fefo(p, qty(4), &batches, date(2024, 1, 1)).unwrap();
        assert_eq!(lines_by_code(&plan), vec![("FULL", 4)]);
        assert!(plan.expired_batches.is_empty());
    }

    #[test]
    fn equal_expiry_ties_break_on_creation_order() {
        let p = ProductId::new();
        let expiry = date(2025, 3, 1);
        let batches = vec![
            batch(p, "LATER", expiry, 3, 60),
            batch(p, "EARLIER", expiry, 3, 10),
        ];
        for _ in 0..3 {
            let plan = plan_fefo(p, qty(4), &batches, date(2025, 1, 1)).unwrap();
            assert_eq!(lines_by_code(&plan), vec![("EARLIER", 3), ("LATER", 1)]);
        }
    }

    #[test]
    fn foreign_batch_is_rejected() {
        let (p, mut batches) = scenario();
        let stranger = batch(ProductId::new(), "X", date(2025, 1, 1), 50, 0);
        let stranger_id = stranger.id;
        batches.push(stranger);
        let err = plan_fefo(p, qty(1), &batches, date(2024, 1, 1)).unwrap_err();
        assert_eq!(
            err,
            AllocationError::ForeignBatch {
                product_id: p,
                batch_id: stranger_id,
            }
        );
    }

    #[test]
    fn apply_detects_concurrent_drain_and_leaves_everything_untouched() {
        let (p, mut batches) = scenario();
        let plan = plan_fefo(p, qty(8), &batches, date(2024, 12, 1)).unwrap();

        // Someone else sold 2 units from B after planning.
        let b = batches.iter_mut().find(|b| b.internal_batch_code == "B").unwrap();
        b.quantity_remaining = 2;
        let b_id = b.id;

        let err = plan.apply_to(&mut batches).unwrap_err();
        assert_eq!(
            err,
            AllocationError::StaleBatchState {
                batch_id: b_id,
                expected: 10,
                found: 2,
            }
        );
        assert_eq!(remaining(&batches, "A"), 5);
        assert_eq!(remaining(&batches, "B"), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_specs() -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
            prop::collection::vec((0i64..60, 0i64..20, 0i64..5), 0..8)
        }

        fn build(p: ProductId, specs: &[(i64, i64, i64)]) -> Vec<Batch> {
            specs
                .iter()
                .enumerate()
                .map(|(i, &(expiry_offset, qty, created_offset))| {
                    batch(
                        p,
                        &format!("B{i}"),
                        date(2025, 1, 1) + Duration::days(expiry_offset),
                        qty,
                        created_offset,
                    )
                })
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: a plan sums to the request exactly, or the call fails
            /// with InsufficientStock and the eligible total really is short.
            #[test]
            fn plan_sums_to_request_or_fails_short(
                specs in arb_specs(),
                requested in 1i64..80,
                sale_offset in 0i64..70,
            ) {
                let p = ProductId::new();
                let batches = build(p, &specs);
                let sale_date = date(2025, 1, 1) + Duration::days(sale_offset);
                let eligible: i64 = batches
                    .iter()
                    .filter(|b| b.is_eligible_on(sale_date))
                    .map(|b| b.quantity_remaining)
                    .sum();

                match plan_fefo(p, qty(requested), &batches, sale_date) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.total(), requested);
                        prop_assert!(eligible >= requested);
                    }
                    Err(AllocationError::InsufficientStock { available, .. }) => {
                        prop_assert_eq!(available, eligible);
                        prop_assert!(eligible < requested);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }

            /// Property: lines come in non-decreasing expiry order, every line
            /// but the last drains its batch, and no batch goes negative.
            #[test]
            fn plan_is_fefo_and_never_overdraws(
                specs in arb_specs(),
                requested in 1i64..80,
                sale_offset in 0i64..70,
            ) {
                let p = ProductId::new();
                let batches = build(p, &specs);
                let sale_date = date(2025, 1, 1) + Duration::days(sale_offset);
                if let Ok(plan) = plan_fefo(p, qty(requested), &batches, sale_date) {
                    for pair in plan.lines.windows(2) {
                        prop_assert!(pair[0].expiry_date <= pair[1].expiry_date);
                    }
                    for line in plan.lines.iter().rev().skip(1) {
                        prop_assert_eq!(line.quantity.get(), line.remaining_before);
                    }
                    for line in &plan.lines {
                        prop_assert!(line.expiry_date >= sale_date);
                    }

                    let mut applied = batches.clone();
                    plan.apply_to(&mut applied).unwrap();
                    prop_assert!(applied.iter().all(|b| b.quantity_remaining >= 0));
                }
            }
        }
    }
}
