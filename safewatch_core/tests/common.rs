#![allow(unused)]

use safewatch_core::RawBalanceRecord;

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedBucket {
    pub period: String,
    pub balance: String,
    pub change: String,
    pub count: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub block_number: u64,
}

#[derive(serde::Deserialize, Debug)]
pub struct AggregationVector {
    pub description: String,
    pub granularity: String,
    pub records: Vec<RawBalanceRecord>,
    pub expected: Vec<ExpectedBucket>,
}

#[derive(serde::Deserialize, Debug)]
pub struct IdentityVector {
    pub description: String,
    pub records: Vec<RawBalanceRecord>,
}

#[derive(serde::Deserialize, Debug)]
pub struct ErrorVector {
    pub description: String,
    pub granularity: String,
    pub records: Vec<RawBalanceRecord>,
    pub kind: String,
}

#[derive(serde::Deserialize, Debug)]
pub struct TestVectors {
    pub aggregations: Vec<AggregationVector>,
    pub identity: Vec<IdentityVector>,
    pub errors: Vec<ErrorVector>,
}

static TEST_VECTORS: &str = include_str!("../../docs/vectors.json");

pub fn test_vectors() -> TestVectors {
    serde_json::from_str(TEST_VECTORS).unwrap()
}
