use std::path::Path;

use safewatch_core::{Address, AggregateError, RawBalanceRecord};
use serde::Deserialize;

/// A history payload: either an API page or a bare array of rows.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Page { items: Vec<RawBalanceRecord> },
    Rows(Vec<RawBalanceRecord>),
}

impl From<HistoryPayload> for Vec<RawBalanceRecord> {
    fn from(value: HistoryPayload) -> Self {
        match value {
            HistoryPayload::Page { items } => items,
            HistoryPayload::Rows(rows) => rows,
        }
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: String,
}

pub struct HistoryRequest<'a> {
    pub server: &'a str,
    pub safe: &'a Address,
    pub token: Option<&'a Address>,
    pub chain: &'a str,
    pub limit: Option<u32>,
}

impl HistoryRequest<'_> {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("safeAddress", self.safe.to_string()),
            ("chain", self.chain.to_string()),
            ("granularity", "raw".to_string()),
        ];
        if let Some(token) = self.token {
            query.push(("tokenAddress", token.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

/// Raw history rows of one Safe from a running indexer.
pub fn fetch(request: &HistoryRequest) -> Result<Vec<RawBalanceRecord>, AggregateError> {
    let upstream = |e: reqwest::Error| AggregateError::UpstreamQueryFailure(e.to_string());
    let url = format!("{}/api/history", request.server.trim_end_matches('/'));

    let response = reqwest::blocking::Client::new()
        .get(url)
        .query(&request.query())
        .send()
        .map_err(upstream)?;

    let status = response.status();
    let body = response.text().map_err(upstream)?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorPayload>(&body).map_or(body, |e| e.error);
        return Err(AggregateError::UpstreamQueryFailure(format!("{status}: {message}")));
    }

    parse(&body)
}

/// Raw history rows from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<Vec<RawBalanceRecord>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text)?)
}

fn parse(text: &str) -> Result<Vec<RawBalanceRecord>, AggregateError> {
    serde_json::from_str::<HistoryPayload>(text)
        .map(Into::into)
        .map_err(|e| {
            AggregateError::UpstreamQueryFailure(format!("unexpected history payload: {e}"))
        })
}
