use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use time::{macros::format_description, OffsetDateTime};

use crate::AggregateError;

/// Time-bucket width used to aggregate a balance series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr,
)]
pub enum Granularity {
    #[default]
    Raw,
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Raw,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
    ];

    /// Key of the calendar period containing `dt`, or `None` for raw.
    ///
    /// Weeks are ISO-8601 weeks keyed by their week-numbering year, so the
    /// days around New Year never share a key with the other end of the year.
    pub fn bucket_key(self, dt: OffsetDateTime) -> Result<Option<String>, time::error::Format> {
        let key = match self {
            Granularity::Raw => return Ok(None),
            Granularity::Hour => dt.format(format_description!("[year]-[month]-[day]-[hour]"))?,
            Granularity::Day => dt.format(format_description!("[year]-[month]-[day]"))?,
            Granularity::Week => {
                let (year, week, _) = dt.to_iso_week_date();
                format!("{year:04}-W{week:02}")
            }
            Granularity::Month => dt.format(format_description!("[year]-[month]"))?,
        };
        Ok(Some(key))
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Granularity::Raw => "raw",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Granularity {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Granularity::Raw),
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            _ => Err(AggregateError::InvalidArgument(format!(
                "unknown granularity {s:?}, expected one of raw, hour, day, week, month"
            ))),
        }
    }
}
