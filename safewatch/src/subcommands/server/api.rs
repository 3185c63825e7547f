use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use itertools::Itertools;
use safewatch_core::{aggregate, check_decimals, project, Address, DEFAULT_DECIMALS};

use crate::{
    db::{self, history::HistoryFilter},
    util::format_time,
};

use self::models::JsonError;

use super::AppState;

mod models {
    use axum::{
        extract::rejection::QueryRejection,
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use safewatch_core::{Address, AggregateError, AggregatedRecord, ChartPoint, Granularity};
    use serde::{Deserialize, Serialize};
    use serde_with::{formats::CommaSeparator, serde_as, DisplayFromStr, StringWithSeparator};

    #[derive(Serialize, Debug)]
    pub struct JsonError {
        pub error: String,
        #[serde(skip)]
        pub status: StatusCode,
    }

    impl JsonError {
        pub fn not_found(what: &str) -> JsonError {
            JsonError {
                error: format!("{what} not found"),
                status: StatusCode::NOT_FOUND,
            }
        }
    }

    impl IntoResponse for JsonError {
        fn into_response(self) -> Response {
            (self.status, Json(self)).into_response()
        }
    }

    impl From<AggregateError> for JsonError {
        fn from(value: AggregateError) -> Self {
            let status = match value {
                AggregateError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                AggregateError::DataIntegrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                AggregateError::UpstreamQueryFailure(_) => StatusCode::BAD_GATEWAY,
            };
            JsonError {
                error: value.to_string(),
                status,
            }
        }
    }

    impl From<anyhow::Error> for JsonError {
        fn from(value: anyhow::Error) -> Self {
            match value.downcast::<AggregateError>() {
                Ok(err) => err.into(),
                Err(value) => {
                    tracing::error!("API error: {value}");
                    JsonError {
                        error: value.to_string(),
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                    }
                }
            }
        }
    }

    impl From<QueryRejection> for JsonError {
        fn from(value: QueryRejection) -> Self {
            JsonError {
                error: value.body_text(),
                status: StatusCode::BAD_REQUEST,
            }
        }
    }

    fn default_chain() -> String {
        "mainnet".into()
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryQuery {
        pub safe_address: Address,
        pub token_address: Option<Address>,
        #[serde(default = "default_chain")]
        pub chain: String,
        pub limit: Option<u32>,
        #[serde(default)]
        pub granularity: Granularity,
        pub decimals: Option<u32>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryResponse {
        pub granularity: Granularity,
        pub total_count: i64,
        pub items: Vec<AggregatedRecord>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct ChartResponse {
        pub granularity: Granularity,
        pub decimals: u32,
        pub points: Vec<ChartPoint>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct BalanceQuery {
        pub safe_address: Address,
        pub token_address: Option<Address>,
        #[serde(default = "default_chain")]
        pub chain: String,
    }

    #[serde_as]
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct BalanceResponse {
        pub id: String,
        pub safe_address: String,
        pub token_address: String,
        pub chain: String,
        #[serde_as(as = "DisplayFromStr")]
        pub balance: i128,
        pub updated_at: i64,
    }

    #[serde_as]
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct BalanceAtQuery {
        pub safe_address: Address,
        pub token_address: Option<Address>,
        #[serde(default = "default_chain")]
        pub chain: String,
        #[serde_as(as = "StringWithSeparator::<CommaSeparator, i64>")]
        pub timestamps: Vec<i64>,
    }

    #[serde_as]
    #[derive(Serialize, Debug, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct BalanceAtResponse {
        pub timestamp: i64,
        #[serde_as(as = "Option<DisplayFromStr>")]
        pub balance: Option<i128>,
        pub block_number: Option<u64>,
    }

    #[derive(Deserialize, Debug)]
    pub struct SafeQuery {
        pub address: Address,
        #[serde(default = "default_chain")]
        pub chain: String,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SafeResponse {
        pub id: String,
        pub address: String,
        pub chain: String,
        pub singleton: Option<String>,
        pub owners: Vec<String>,
        pub threshold: i64,
        pub initializer: Option<String>,
        pub fallback_handler: Option<String>,
        pub guard: Option<String>,
        pub created_at: Option<i64>,
        pub created_block: i64,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct CursorResponse {
        pub chain: String,
        pub block_number: i64,
        pub log_index: i64,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct StatsResponse {
        pub version: &'static str,
        pub build_date: &'static str,
        pub proxies: i64,
        pub history_rows: i64,
        pub balances: i64,
        pub last_index_time: Option<String>,
        pub cursors: Vec<CursorResponse>,
    }
}

fn history_filter(
    state: &AppState,
    safe_address: Address,
    token_address: Option<Address>,
    chain: String,
    limit: Option<u32>,
) -> HistoryFilter {
    let limit = limit
        .unwrap_or_else(|| state.config.default_limit())
        .clamp(1, state.config.max_limit());
    HistoryFilter {
        safe_address,
        token_address,
        chain,
        limit,
    }
}

pub async fn history(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<models::HistoryQuery>, JsonError>,
) -> Result<Json<models::HistoryResponse>, JsonError> {
    let filter = history_filter(
        &state,
        query.safe_address,
        query.token_address,
        query.chain,
        query.limit,
    );
    let records = db::history::recent(&state.pool, &filter).await?;
    let total_count = db::history::count(&state.pool, &filter).await?;

    Ok(Json(models::HistoryResponse {
        granularity: query.granularity,
        total_count,
        items: aggregate(&records, query.granularity)?,
    }))
}

pub async fn chart(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<models::HistoryQuery>, JsonError>,
) -> Result<Json<models::ChartResponse>, JsonError> {
    let decimals = query.decimals.unwrap_or(DEFAULT_DECIMALS);
    check_decimals(decimals)?;
    let filter = history_filter(
        &state,
        query.safe_address,
        query.token_address,
        query.chain,
        query.limit,
    );
    let records = db::history::recent(&state.pool, &filter).await?;
    let aggregated = aggregate(&records, query.granularity)?;

    Ok(Json(models::ChartResponse {
        granularity: query.granularity,
        decimals,
        points: project(&aggregated, query.granularity, decimals)?,
    }))
}

pub async fn balance(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<models::BalanceQuery>, JsonError>,
) -> Result<Json<models::BalanceResponse>, JsonError> {
    let token = query.token_address.unwrap_or_else(Address::native);
    let row = db::balance::find(&state.pool, &query.safe_address, &token, &query.chain)
        .await?
        .ok_or_else(|| JsonError::not_found("Balance"))?;

    Ok(Json(models::BalanceResponse {
        balance: row.amount()?,
        id: row.id,
        safe_address: row.safe_address,
        token_address: row.token_address,
        chain: row.chain,
        updated_at: row.updated_at,
    }))
}

pub async fn balance_at(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<models::BalanceAtQuery>, JsonError>,
) -> Result<Json<Vec<models::BalanceAtResponse>>, JsonError> {
    let token = query.token_address.unwrap_or_else(Address::native);
    let mut balances = Vec::with_capacity(query.timestamps.len());

    for timestamp in query.timestamps {
        let record = db::history::balance_at(
            &state.pool,
            &query.safe_address,
            &token,
            &query.chain,
            timestamp,
        )
        .await?;
        balances.push(models::BalanceAtResponse {
            timestamp,
            balance: record.as_ref().map(|r| r.balance),
            block_number: record.as_ref().map(|r| r.block_number),
        });
    }

    Ok(Json(balances))
}

pub async fn safe(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<models::SafeQuery>, JsonError>,
) -> Result<Json<models::SafeResponse>, JsonError> {
    let id = safewatch_core::proxy_id(&query.chain, &query.address);
    let proxy = db::proxy::find(&state.pool, &id)
        .await?
        .ok_or_else(|| JsonError::not_found("Safe"))?;

    Ok(Json(models::SafeResponse {
        owners: proxy.owners()?,
        id: proxy.id,
        address: proxy.address,
        chain: proxy.chain,
        singleton: proxy.singleton,
        threshold: proxy.threshold,
        initializer: proxy.initializer,
        fallback_handler: proxy.fallback_handler,
        guard: proxy.guard,
        created_at: proxy.created_at,
        created_block: proxy.created_block,
    }))
}

pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<models::StatsResponse>, JsonError> {
    let last_index_time = db::event_log::last_index_time(&state.pool)
        .await?
        .map(format_time)
        .transpose()?;
    let cursors = db::cursor::all(&state.pool)
        .await?
        .into_iter()
        .map(|(chain, block_number, log_index)| models::CursorResponse {
            chain,
            block_number,
            log_index,
        })
        .collect_vec();

    Ok(Json(models::StatsResponse {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("VERGEN_BUILD_TIMESTAMP"),
        proxies: db::stats::proxy_count(&state.pool).await?,
        history_rows: db::stats::history_count(&state.pool).await?,
        balances: db::stats::balance_count(&state.pool).await?,
        last_index_time,
        cursors,
    }))
}
