use serde::Serialize;
use time::{macros::format_description, Duration, OffsetDateTime};

use crate::{AggregateError, AggregatedRecord, Granularity};

/// Fixed-point decimals of native-currency base units.
pub const DEFAULT_DECIMALS: u32 = 18;

/// Largest accepted decimals, the digit count of `i128::MAX`.
pub const MAX_DECIMALS: u32 = 38;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    /// Block time in milliseconds.
    pub timestamp: i64,
    pub date: String,
    pub time: String,
    pub balance: f64,
    pub change: f64,
    pub block_number: u64,
    pub period: Option<String>,
    pub count: usize,
}

/// Checks that `decimals` is a usable fixed-point scale.
pub fn check_decimals(decimals: u32) -> Result<i32, AggregateError> {
    i32::try_from(decimals)
        .ok()
        .filter(|_| decimals <= MAX_DECIMALS)
        .ok_or_else(|| {
            AggregateError::InvalidArgument(format!(
                "decimals {decimals} out of range 0..={MAX_DECIMALS}"
            ))
        })
}

/// Converts an integer amount of base units into display units.
#[allow(clippy::cast_precision_loss)]
pub fn to_display_units(amount: i128, decimals: u32) -> Result<f64, AggregateError> {
    Ok(amount as f64 / 10f64.powi(check_decimals(decimals)?))
}

/// Date and time labels of a point at `dt` for the given granularity.
pub fn period_labels(
    dt: OffsetDateTime,
    granularity: Granularity,
) -> Result<(String, String), time::error::Format> {
    let date = format_description!("[year]-[month]-[day]");
    let labels = match granularity {
        Granularity::Raw => (
            dt.format(date)?,
            dt.format(format_description!("[hour]:[minute]:[second]"))?,
        ),
        Granularity::Hour => (dt.format(date)?, format!("{}:00", dt.hour())),
        Granularity::Day => (dt.format(date)?, String::new()),
        Granularity::Week => {
            let back = Duration::days(i64::from(dt.weekday().number_days_from_monday()));
            let monday = dt.checked_sub(back).unwrap_or(dt);
            (format!("Week of {}", monday.format(date)?), String::new())
        }
        Granularity::Month => (
            dt.format(format_description!("[month repr:long] [year]"))?,
            String::new(),
        ),
    };
    Ok(labels)
}

/// Projects aggregated records into chart points, oldest first.
pub fn project(
    records: &[AggregatedRecord],
    granularity: Granularity,
    decimals: u32,
) -> Result<Vec<ChartPoint>, AggregateError> {
    check_decimals(decimals)?;
    let mut ordered = records.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|r| r.record.block_timestamp);

    ordered
        .into_iter()
        .map(|aggregated| -> Result<ChartPoint, AggregateError> {
            let record = &aggregated.record;
            let integrity =
                || AggregateError::integrity(&record.id, "blockTimestamp", record.block_timestamp);
            let (date, time) =
                period_labels(record.datetime()?, granularity).map_err(|_| integrity())?;
            let timestamp = record.block_timestamp.checked_mul(1000).ok_or_else(integrity)?;

            Ok(ChartPoint {
                timestamp,
                date,
                time,
                balance: to_display_units(record.balance, decimals)?,
                change: to_display_units(record.change, decimals)?,
                block_number: record.block_number,
                period: aggregated.bucket.as_ref().map(|b| b.period.clone()),
                count: aggregated.count(),
            })
        })
        .collect()
}
