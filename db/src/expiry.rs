use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde_json::Value;

use crate::Error;

/// Computes the instant a session expires.
///
/// A truthy `cookie.expires` field on the session wins: a number is read as epoch
/// milliseconds, a string as an RFC 3339 timestamp, an RFC 2822 / HTTP date or a bare
/// `YYYY-MM-DD` date (midnight UTC). `null`, `false`, `""` and `0` count as no hint. Without
/// a hint the session lives for `ttl`, or for `default_ttl` when `ttl` is missing or zero.
pub fn expires_on(
    session: &Value,
    ttl: Option<Duration>,
    default_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, Error> {
    if let Some(expires) = cookie_expiry(session)? {
        return Ok(expires);
    }

    let ttl = ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(default_ttl);

    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::InvalidExpiry(format!("ttl of {ttl:?} is out of range")))
}

fn cookie_expiry(session: &Value) -> Result<Option<DateTime<Utc>>, Error> {
    let Some(hint) = session.pointer("/cookie/expires") else {
        return Ok(None);
    };

    match hint {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => parse_date(s).map(Some),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| Error::InvalidExpiry(n.to_string()))?;
            if millis == 0 {
                return Ok(None);
            }
            DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| Error::InvalidExpiry(n.to_string()))
        }
        other => Err(Error::InvalidExpiry(other.to_string())),
    }
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .map(|date| date.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        })
        .map_err(|_| Error::InvalidExpiry(s.to_string()))
}
