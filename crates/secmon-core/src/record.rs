use crate::error::{MonitorError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const UNKNOWN_LABEL: &str = "unknown";

/// One line of a worker metrics file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ts: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instance_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attempt: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elapsed_ms: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proxy: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rotated_on_failure: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub batch_region: String,
}

impl EventRecord {
    /// Decode one metrics line. Trailing line terminators are ignored.
    pub fn decode(line: &str) -> Result<Self> {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        Ok(serde_json::from_str(trimmed)?)
    }

    pub fn region_label(&self) -> &str {
        label_or_unknown(&self.batch_region)
    }

    pub fn instance_label(&self) -> &str {
        label_or_unknown(&self.instance_id)
    }

    /// Event time in epoch seconds. An unparseable timestamp falls back to
    /// `now_secs`; historical records with a bad `ts` land in the current bucket.
    pub fn epoch_secs_or(&self, now_secs: i64) -> i64 {
        parse_timestamp(&self.ts).unwrap_or(now_secs)
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SS` as a naive UTC wall-clock time.
pub fn parse_timestamp(ts: &str) -> Result<i64> {
    NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc().timestamp())
        .map_err(|err| MonitorError::Timestamp(format!("{ts:?}: {err}")))
}

fn label_or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN_LABEL
    } else {
        value
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_record_and_ignores_unknown_fields() {
        let line = r#"{"ts":"2025-01-02T10:00:01","instance_id":"gen1","attempt":3,"success":true,"reason":"success_text_detected","elapsed_ms":812,"proxy":true,"rotated_on_failure":false,"url":"https://example.test","batch_region":"us-east","extra":{"nested":1}}"#;
        let record = EventRecord::decode(line).expect("decode");
        assert_eq!(record.instance_id, "gen1");
        assert_eq!(record.attempt, 3);
        assert!(record.success);
        assert_eq!(record.elapsed_ms, 812);
        assert!(record.proxy);
        assert_eq!(record.region_label(), "us-east");
    }

    #[test]
    fn missing_and_null_fields_default() {
        let record = EventRecord::decode("{\"success\":false,\"batch_region\":null}\r\n")
            .expect("decode");
        assert!(!record.success);
        assert_eq!(record.region_label(), UNKNOWN_LABEL);
        assert_eq!(record.instance_label(), UNKNOWN_LABEL);
        assert_eq!(record.attempt, 0);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(EventRecord::decode("not json").is_err());
        assert!(EventRecord::decode("").is_err());
        assert!(EventRecord::decode("[1,2]").is_err());
        assert!(EventRecord::decode(r#"{"success":"yes"}"#).is_err());
    }

    #[test]
    fn timestamp_parses_as_utc_and_falls_back_to_now() {
        assert_eq!(parse_timestamp("1970-01-01T00:01:40").expect("parse"), 100);
        let record = EventRecord {
            ts: "yesterday".to_string(),
            ..EventRecord::default()
        };
        assert_eq!(record.epoch_secs_or(4242), 4242);
        assert!(matches!(
            parse_timestamp("2025-13-01T00:00:00"),
            Err(MonitorError::Timestamp(_))
        ));
    }
}
