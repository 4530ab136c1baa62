use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::job::AiJob;
use crate::result::{AiError, AiResult};

/// 12 months for the yearly lag plus a 3-month buffer.
pub const MIN_HISTORY_MONTHS: usize = 15;
pub const MAX_MONTHS_AHEAD: u32 = 24;

const SEASONAL_LAG: usize = 12;
const ROLLING_WINDOW: usize = 3;

/// Projection weights in tenths: same month last year, last month, 3-month mean.
const W_LAG_12: i64 = 5;
const W_LAG_1: i64 = 3;
const W_ROLLING: i64 = 2;

/// One SALE from the ledger, reduced to what forecasting needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub occurred_at: DateTime<Utc>,
    pub product_name: String,
    pub quantity: i64,
}

/// Units sold in one calendar month (`month` is the first day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyDemand {
    pub month: NaiveDate,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub product_name: String,
    pub predictions: Vec<MonthlyDemand>,
    /// Mean of the months the model was scored on, truncated.
    pub average_monthly_sales: i64,
    /// `max(0, 100 × (1 − RMSE / mean))`, one decimal.
    pub accuracy: f64,
}

/// Monthly totals for `product_name`, from its first to its last month with
/// sales; months without sales are zero.
pub fn monthly_series(records: &[SaleRecord], product_name: &str) -> Vec<MonthlyDemand> {
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for r in records.iter().filter(|r| r.product_name == product_name) {
        if let Some(month) = month_start(r.occurred_at.date_naive()) {
            *totals.entry(month).or_insert(0) += r.quantity;
        }
    }

    let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut month = first;
    while month <= last {
        series.push(MonthlyDemand {
            month,
            quantity: totals.get(&month).copied().unwrap_or(0),
        });
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    series
}

/// Up to `n` product names ranked by total units sold; ties by name.
pub fn top_products(records: &[SaleRecord], n: usize) -> Vec<String> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for r in records {
        *totals.entry(r.product_name.as_str()).or_insert(0) += r.quantity;
    }

    let mut ranked: Vec<(&str, i64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(name, _)| name.to_string()).collect()
}

/// Forecast of the coming months for one product.
///
/// Model: each month is projected as a fixed blend of the same month a year
/// earlier, the previous month and the mean of the previous three. Future
/// months are predicted recursively (each prediction becomes history for the
/// next) and clamped to non-negative whole units.
#[derive(Debug, Clone)]
pub struct DemandForecastJob {
    product_name: String,
    input: Vec<SaleRecord>,
    months_ahead: u32,
}

impl DemandForecastJob {
    pub fn new(product_name: impl Into<String>, history: Vec<SaleRecord>) -> Self {
        Self {
            product_name: product_name.into(),
            input: history,
            months_ahead: 3,
        }
    }

    pub fn with_months_ahead(mut self, months_ahead: u32) -> Self {
        self.months_ahead = months_ahead;
        self
    }

    pub fn forecast(&self) -> Result<DemandForecast, AiError> {
        if !(1..=MAX_MONTHS_AHEAD).contains(&self.months_ahead) {
            return Err(AiError::InvalidInput(format!(
                "months_ahead must be between 1 and {MAX_MONTHS_AHEAD} (got {})",
                self.months_ahead
            )));
        }

        let series = monthly_series(&self.input, &self.product_name);
        if series.is_empty() {
            return Err(AiError::InvalidInput(format!(
                "no sales history for '{}'",
                self.product_name
            )));
        }
        if series.len() < MIN_HISTORY_MONTHS {
            return Err(AiError::InsufficientHistory {
                months: series.len(),
                required: MIN_HISTORY_MONTHS,
            });
        }

        let mut history: Vec<i64> = series.iter().map(|m| m.quantity).collect();

        // In-sample fit over every month that has a full year of lag.
        let actual = &history[SEASONAL_LAG..];
        let fitted: Vec<f64> = (SEASONAL_LAG..history.len())
            .map(|i| project(&history[..i]))
            .collect();
        let mean = actual.iter().sum::<i64>() as f64 / actual.len() as f64;
        let rmse = (actual
            .iter()
            .zip(&fitted)
            .map(|(&a, f)| (a as f64 - f).powi(2))
            .sum::<f64>()
            / actual.len() as f64)
            .sqrt();
        let accuracy = if mean > 0.0 {
            (100.0 * (1.0 - rmse / mean)).max(0.0)
        } else {
            0.0
        };

        let mut month = series[series.len() - 1].month;
        let mut predictions = Vec::with_capacity(self.months_ahead as usize);
        for _ in 0..self.months_ahead {
            month = month
                .checked_add_months(Months::new(1))
                .ok_or_else(|| AiError::Internal("forecast month out of range".to_string()))?;
            let quantity = project(&history).max(0.0).trunc() as i64;
            predictions.push(MonthlyDemand { month, quantity });
            history.push(quantity);
        }

        Ok(DemandForecast {
            product_name: self.product_name.clone(),
            predictions,
            average_monthly_sales: mean.trunc() as i64,
            accuracy: (accuracy * 10.0).round() / 10.0,
        })
    }
}

impl AiJob for DemandForecastJob {
    type Input = Vec<SaleRecord>;

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<AiResult, AiError> {
        let forecast = self.forecast()?;
        let next = forecast.predictions.first().map(|m| m.quantity).unwrap_or(0);

        Ok(AiResult::new(next as f64, forecast.accuracy / 100.0)
            .with_explanation(format!(
                "projected {} month(s) for '{}' from lag-12/lag-1/rolling-3 blend; in-sample accuracy {}%",
                forecast.predictions.len(),
                forecast.product_name,
                forecast.accuracy
            ))
            .with_metadata(json!({
                "kind": "demand.forecast",
                "product_name": forecast.product_name,
                "weights": {
                    "lag_12": W_LAG_12 as f64 / 10.0,
                    "lag_1": W_LAG_1 as f64 / 10.0,
                    "rolling_mean_3": W_ROLLING as f64 / 10.0,
                },
                "average_monthly_sales": forecast.average_monthly_sales,
                "accuracy": forecast.accuracy,
                "predictions": forecast.predictions,
            })))
    }
}

/// Next month's projected units and the model accuracy.
pub fn next_month(history: Vec<SaleRecord>, product_name: &str) -> Result<(i64, f64), AiError> {
    let forecast = DemandForecastJob::new(product_name, history)
        .with_months_ahead(1)
        .forecast()?;
    let qty = forecast.predictions.first().map(|m| m.quantity).unwrap_or(0);
    Ok((qty, forecast.accuracy))
}

/// Projection for the month right after `history` (needs >= 12 points).
fn project(history: &[i64]) -> f64 {
    let n = history.len();
    let lag_12 = history[n - SEASONAL_LAG];
    let lag_1 = history[n - 1];
    let rolling_sum: i64 = history[n - ROLLING_WINDOW..].iter().sum();
    // Scaled by tenths × window so whole-unit history stays exact.
    let window = ROLLING_WINDOW as i64;
    let scaled = window * (W_LAG_12 * lag_12 + W_LAG_1 * lag_1) + W_ROLLING * rolling_sum;
    scaled as f64 / (10 * window) as f64
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}
