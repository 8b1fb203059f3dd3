//! Module that allows to (de-)serialize a time series as a JSON object keyed by unix timestamps.
//!
//! JSON object keys must be strings, so a `Vec<(f64, V)>` is written as
//! `{"1700000000.25": V, ...}` and read back in ascending timestamp order.
//!
//! Example:
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Overhead {
//!     #[serde(with = "payless_utils::serde::timestamp_map")]
//!     points: Vec<(f64, u64)>,
//! }
//! ```

use std::{fmt, marker::PhantomData};

use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Format a unix timestamp (in seconds) the way it appears as an object key.
pub fn format_timestamp(timestamp: f64) -> String {
    timestamp.to_string()
}

/// Serialize a sequence of `(timestamp, value)` pairs as a map keyed by the formatted timestamp.
///
/// Entries are written in the order of the sequence. Two entries with the same timestamp produce a
/// duplicate key; readers keep the last one.
pub fn serialize<V: Serialize, S: Serializer>(
    series: &[(f64, V)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(series.iter().map(|(ts, val)| (format_timestamp(*ts), val)))
}

/// Deserialize a map keyed by formatted timestamps into a sequence sorted by timestamp.
pub fn deserialize<'de, V: Deserialize<'de>, D>(deserializer: D) -> Result<Vec<(f64, V)>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(SeriesVisitor(PhantomData))
}

struct SeriesVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for SeriesVisitor<V> {
    type Value = Vec<(f64, V)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map keyed by unix timestamps")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut series = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, val)) = map.next_entry::<String, V>()? {
            let ts: f64 = key
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid timestamp key {key:?}")))?;
            series.push((ts, val));
        }
        series.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(series)
    }
}
