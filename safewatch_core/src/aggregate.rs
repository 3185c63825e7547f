use std::collections::HashMap;

use crate::{AggregateError, AggregatedRecord, BalanceRecord, Bucket, Granularity};

/// Reduces a balance series to one record per calendar period.
///
/// Raw granularity and empty input are returned unchanged. Otherwise records
/// are grouped by the UTC period of their block timestamp, and each group is
/// reduced to its last record (end-of-period balance) carrying the exact sum
/// of the group's changes. Output is ordered by block timestamp.
///
/// Within a group records are ordered by block timestamp alone. Records that
/// share a timestamp keep their input order, so a period ending on such a tie
/// reports whichever of them came last in the input.
pub fn aggregate(
    records: &[BalanceRecord],
    granularity: Granularity,
) -> Result<Vec<AggregatedRecord>, AggregateError> {
    if granularity == Granularity::Raw || records.is_empty() {
        return Ok(records.iter().cloned().map(AggregatedRecord::from).collect());
    }

    let mut groups: HashMap<String, Vec<&BalanceRecord>> = HashMap::new();
    for record in records {
        let key = bucket_key(record, granularity)?;
        groups.entry(key).or_default().push(record);
    }

    let mut aggregated = groups
        .into_iter()
        .filter_map(|(period, members)| reduce(period, members).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    aggregated.sort_by_key(|a| a.record.block_timestamp);

    tracing::debug!(
        "Aggregated {} records into {} {granularity} buckets",
        records.len(),
        aggregated.len()
    );
    Ok(aggregated)
}

/// Parses `granularity` and aggregates.
pub fn aggregate_by(
    records: &[BalanceRecord],
    granularity: &str,
) -> Result<Vec<AggregatedRecord>, AggregateError> {
    aggregate(records, granularity.parse()?)
}

fn bucket_key(record: &BalanceRecord, granularity: Granularity) -> Result<String, AggregateError> {
    let dt = record.datetime()?;
    granularity
        .bucket_key(dt)
        .ok()
        .flatten()
        .ok_or_else(|| {
            AggregateError::integrity(&record.id, "blockTimestamp", record.block_timestamp)
        })
}

fn reduce(
    period: String,
    mut members: Vec<&BalanceRecord>,
) -> Result<Option<AggregatedRecord>, AggregateError> {
    members.sort_by_key(|r| r.block_timestamp);

    let (Some(first), Some(last)) = (members.first(), members.last()) else {
        return Ok(None);
    };

    let change = members.iter().try_fold(0i128, |sum, r| {
        sum.checked_add(r.change)
            .ok_or_else(|| AggregateError::integrity(&r.id, "change", r.change))
    })?;

    Ok(Some(AggregatedRecord {
        record: BalanceRecord {
            change,
            ..(*last).clone()
        },
        bucket: Some(Bucket {
            period,
            count: members.len(),
            first_timestamp: first.block_timestamp,
            last_timestamp: last.block_timestamp,
        }),
    }))
}
