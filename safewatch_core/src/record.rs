use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use time::OffsetDateTime;

use crate::AggregateError;

/// One append-only balance history row.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRecord {
    pub id: String,
    pub safe_address: String,
    pub token_address: String,
    pub chain: String,
    #[serde_as(as = "DisplayFromStr")]
    pub balance: i128,
    #[serde_as(as = "DisplayFromStr")]
    pub change: i128,
    pub block_number: u64,
    pub block_timestamp: i64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl BalanceRecord {
    /// Block time as a UTC date-time.
    pub fn datetime(&self) -> Result<OffsetDateTime, AggregateError> {
        OffsetDateTime::from_unix_timestamp(self.block_timestamp).map_err(|_| {
            AggregateError::integrity(&self.id, "blockTimestamp", self.block_timestamp)
        })
    }
}

/// A history row as delivered by a query layer, before any numeric parsing.
///
/// Integer columns may arrive as JSON numbers or as decimal strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawBalanceRecord {
    pub id: String,
    pub safe_address: String,
    pub token_address: String,
    pub chain: String,
    pub balance: Value,
    pub change: Value,
    pub block_number: Value,
    pub block_timestamp: Value,
    pub transaction_hash: String,
    pub log_index: Value,
}

fn integer(id: &str, field: &'static str, value: &Value) -> Result<i128, AggregateError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<i128>().ok(),
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    };
    parsed.ok_or_else(|| AggregateError::integrity(id, field, value))
}

fn narrow<T: TryFrom<i128>>(
    id: &str,
    field: &'static str,
    value: &Value,
) -> Result<T, AggregateError> {
    T::try_from(integer(id, field, value)?).map_err(|_| AggregateError::integrity(id, field, value))
}

impl TryFrom<RawBalanceRecord> for BalanceRecord {
    type Error = AggregateError;

    fn try_from(raw: RawBalanceRecord) -> Result<Self, Self::Error> {
        let id = raw.id.as_str();
        let record = BalanceRecord {
            balance: integer(id, "balance", &raw.balance)?,
            change: integer(id, "change", &raw.change)?,
            block_number: narrow(id, "blockNumber", &raw.block_number)?,
            block_timestamp: narrow(id, "blockTimestamp", &raw.block_timestamp)?,
            log_index: narrow(id, "logIndex", &raw.log_index)?,
            id: raw.id,
            safe_address: raw.safe_address,
            token_address: raw.token_address,
            chain: raw.chain,
            transaction_hash: raw.transaction_hash,
        };

        // Reject timestamps the calendar cannot represent up front.
        record.datetime()?;
        Ok(record)
    }
}

/// Parses a batch of raw rows. One bad row fails the whole batch.
pub fn parse_records(raw: Vec<RawBalanceRecord>) -> Result<Vec<BalanceRecord>, AggregateError> {
    raw.into_iter().map(BalanceRecord::try_from).collect()
}

/// Derived metadata of an aggregated time bucket.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub period: String,
    pub count: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
}

/// A record produced by the aggregator: a representative row, plus its bucket
/// when the series was aggregated.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRecord {
    #[serde(flatten)]
    pub record: BalanceRecord,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
}

impl From<BalanceRecord> for AggregatedRecord {
    fn from(record: BalanceRecord) -> Self {
        AggregatedRecord {
            record,
            bucket: None,
        }
    }
}

impl AggregatedRecord {
    /// Number of history rows this record stands for.
    pub fn count(&self) -> usize {
        self.bucket.as_ref().map_or(1, |b| b.count)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw() -> RawBalanceRecord {
        serde_json::from_value(json!({
            "id": "mainnet:0xabc:1",
            "safeAddress": "0x6dd09d21b535d5bcee36fec8f50726f0f0e6725b",
            "tokenAddress": "0x0000000000000000000000000000000000000000",
            "chain": "mainnet",
            "balance": "170141183460469231731687303715884105727",
            "change": "-5000000000000000000",
            "blockNumber": "23804491",
            "blockTimestamp": 1762900000,
            "transactionHash": "0xabc",
            "logIndex": 1
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_raw() {
        let record = BalanceRecord::try_from(raw()).unwrap();
        assert_eq!(record.balance, i128::MAX);
        assert_eq!(record.change, -5_000_000_000_000_000_000);
        assert_eq!(record.block_number, 23_804_491);
        assert_eq!(record.block_timestamp, 1_762_900_000);
        assert_eq!(record.log_index, 1);
    }

    #[test]
    fn test_unparseable_fields() {
        let cases = [
            ("balance", json!("12abc")),
            ("change", json!(1.5)),
            ("blockTimestamp", json!(null)),
            ("blockTimestamp", json!("soon")),
            ("blockTimestamp", json!(i64::MAX)),
            ("blockNumber", json!(-1)),
            ("logIndex", json!([])),
        ];
        for (field, value) in cases {
            let mut raw = raw();
            match field {
                "balance" => raw.balance = value,
                "change" => raw.change = value,
                "blockTimestamp" => raw.block_timestamp = value,
                "blockNumber" => raw.block_number = value,
                _ => raw.log_index = value,
            }
            match BalanceRecord::try_from(raw) {
                Err(AggregateError::DataIntegrity { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected integrity error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_batch_aborts_on_bad_row() {
        let mut bad = raw();
        bad.id = "mainnet:0xdef:2".into();
        bad.change = json!("not a number");
        let err = parse_records(vec![raw(), bad]).unwrap_err();
        assert_eq!(
            err,
            AggregateError::DataIntegrity {
                id: "mainnet:0xdef:2".into(),
                field: "change",
                value: "\"not a number\"".into(),
            }
        );
    }

    #[test]
    fn test_serialize_big_integers_as_strings() {
        let record = BalanceRecord::try_from(raw()).unwrap();
        let value = serde_json::to_value(AggregatedRecord::from(record)).unwrap();
        assert_eq!(value["balance"], json!("170141183460469231731687303715884105727"));
        assert_eq!(value["blockNumber"], json!(23_804_491));
        assert!(value.get("period").is_none());
    }
}
