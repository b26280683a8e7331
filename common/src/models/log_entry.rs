// common/src/models/log_entry.rs
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One observed request, as stored by the monitor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Client address; entries without one are left out of per-IP grouping
    #[serde(rename = "sourceIP", alias = "ip", default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status_code: u16,
    /// ISO-8601 timestamp as received
    #[serde(default)]
    pub timestamp: String,
}

/// Canonical identity of a log entry, shared by page merges and pushes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub timestamp: String,
    pub url: String,
    pub source_ip: Option<String>,
}

impl LogEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            timestamp: self.timestamp.clone(),
            url: self.url.clone(),
            source_ip: self.source_ip.clone(),
        }
    }

    /// Whether the response status counts as a successful request
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }

    /// Parsed timestamp; unparseable values map to the Unix epoch.
    pub fn parsed_timestamp(&self) -> DateTime<Utc> {
        parse_timestamp(&self.timestamp).unwrap_or_default()
    }
}

/// Parse an ISO-8601 timestamp, accepting a missing offset as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Format a timestamp the way the backend emits them
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A log record as received from the collection endpoint or the push channel.
///
/// Every field is optional on the wire. Older agents only report the
/// originating request, so `request` may carry either the URL string or an
/// object with a `url` field. Scalar fields accept loosely typed values
/// (`"404"` for a status, epoch milliseconds for a timestamp); a value that
/// cannot be converted decodes as absent instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEntry {
    #[serde(rename = "sourceIP", alias = "ip", default, deserialize_with = "lenient_string")]
    pub source_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status_code: Option<u16>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// Required fields that were absent or unreadable before normalization filled them in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("log entry missing or unreadable fields: {}", .missing.join(", "))]
pub struct MalformedEntry {
    pub missing: Vec<&'static str>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|code| u16::try_from(code).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        // Epoch milliseconds, as `Date.now()` reports them
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(format_timestamp),
        _ => None,
    })
}

impl RawLogEntry {
    fn request_url(&self) -> Option<String> {
        match self.request.as_ref()? {
            Value::String(url) => Some(url.clone()),
            Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    /// Best-effort conversion into a stored entry.
    ///
    /// The URL falls back to the embedded request, a missing timestamp becomes
    /// `now`. Fields that had to be filled in are reported alongside the entry.
    pub fn normalize(self, now: DateTime<Utc>) -> (LogEntry, Option<MalformedEntry>) {
        let mut missing = Vec::new();

        let url = match non_empty(self.url.clone()).or_else(|| non_empty(self.request_url())) {
            Some(url) => url,
            None => {
                missing.push("url");
                String::new()
            }
        };

        let method = non_empty(self.method).unwrap_or_else(|| {
            missing.push("method");
            String::new()
        });

        let status_code = self.status_code.unwrap_or_else(|| {
            missing.push("statusCode");
            0
        });

        let timestamp = non_empty(self.timestamp).unwrap_or_else(|| {
            missing.push("timestamp");
            format_timestamp(now)
        });

        let entry = LogEntry {
            source_ip: non_empty(self.source_ip),
            url,
            method,
            status_code,
            timestamp,
        };

        let malformed = if missing.is_empty() {
            None
        } else {
            Some(MalformedEntry { missing })
        };

        (entry, malformed)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
