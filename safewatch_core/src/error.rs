#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("record {id}: unparseable {field} value {value:?}")]
    DataIntegrity {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("upstream query failed: {0}")]
    UpstreamQueryFailure(String),
}

impl AggregateError {
    pub fn integrity(id: &str, field: &'static str, value: impl ToString) -> AggregateError {
        AggregateError::DataIntegrity {
            id: id.to_owned(),
            field,
            value: value.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("event {kind} emitted by {address} out of order at block {block_number}")]
    OutOfOrder {
        kind: crate::EventKind,
        address: crate::Address,
        block_number: u64,
    },
}
