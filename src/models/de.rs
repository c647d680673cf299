//! Lenient field decoders for records written by older dashboard builds.
//!
//! The store holds whatever the browser last wrote: ids saved as numbers,
//! lists saved as `null`, keyed maps or comma-joined strings, numbers saved
//! as strings. These helpers accept those shapes and fail only on values
//! that cannot be interpreted at all.

use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// String field that may be stored as a number, a bool or `null`
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a string, found {}", other))),
    }
}

/// List of strings stored as an array, a keyed map, or a comma-joined string
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) => return Ok(split_comma_list(&s)),
        Value::Array(items) => items,
        Value::Object(map) => ordered_entries(map).into_iter().map(|(_, v)| v).collect(),
        other => return Err(D::Error::custom(format!("expected a list, found {}", other))),
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => {}
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Value::Number(n) => out.push(n.to_string()),
            other => {
                return Err(D::Error::custom(format!(
                    "expected a list of strings, found {}",
                    other
                )))
            }
        }
    }
    Ok(out)
}

/// List of records stored as an array (holes allowed) or a keyed map.
///
/// Map keys are used as the record id when the record has none.
pub fn record_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items: Vec<Value> = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
        Value::Object(map) => ordered_entries(map)
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(key, mut v)| {
                if let Value::Object(record) = &mut v {
                    record.entry("id").or_insert(Value::String(key));
                }
                v
            })
            .collect(),
        other => return Err(D::Error::custom(format!("expected a list, found {}", other))),
    };

    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(D::Error::custom))
        .collect()
}

/// Number stored as a number, a numeric string ("$5,000" allowed) or `null`
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => parse_number(&s).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected a number, found {}", other))),
    }
}

/// Whole number, clamped at zero
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number(deserializer)?;
    Ok(n.max(0.0).min(u32::MAX as f64).round() as u32)
}

/// Signed whole number (display order)
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.round() as i64)
}

/// Percentage clamped to `0..=100`
pub fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.clamp(0.0, 100.0).round() as u8)
}

/// Boolean stored as a bool, `"true"`/`"false"`, 0/1 or `null`
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean, found {:?}", other))),
        },
        other => Err(D::Error::custom(format!("expected a boolean, found {}", other))),
    }
}

/// Boolean that defaults to `true` when stored as `null`
pub fn flag_default_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(true),
        other => flag(other).map_err(D::Error::custom),
    }
}

pub fn default_true() -> bool {
    true
}

/// Split a comma-separated input, trimming entries and dropping empty ones
pub fn split_comma_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Entries of a keyed map in list order: numeric keys (sparse arrays) sort
/// numerically, anything else (push keys) sorts lexicographically.
pub fn ordered_entries(map: serde_json::Map<String, Value>) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = map.into_iter().collect();
    if entries.iter().all(|(k, _)| k.parse::<u64>().is_ok()) {
        entries.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX));
    }
    entries
}

fn parse_number(input: &str) -> Result<f64, String> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '%'))
        .collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .map_err(|_| format!("expected a number, found {:?}", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default)]
    struct Sample {
        #[serde(default, deserialize_with = "string")]
        id: String,
        #[serde(default, deserialize_with = "string_list")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "number")]
        budget: f64,
        #[serde(default, deserialize_with = "percent")]
        progress: u8,
        #[serde(default, deserialize_with = "flag")]
        done: bool,
        #[serde(default = "default_true", deserialize_with = "flag_default_true")]
        visible: bool,
    }

    fn sample(value: Value) -> Sample {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        assert_eq!(sample(json!({"id": 1700000000000u64})).id, "1700000000000");
    }

    #[test]
    fn test_string_list_shapes() {
        assert!(sample(json!({"tags": null})).tags.is_empty());
        assert_eq!(sample(json!({"tags": "rust, go,, "})).tags, vec!["rust", "go"]);
        assert_eq!(
            sample(json!({"tags": {"0": "a", "1": "b"}})).tags,
            vec!["a", "b"]
        );
        assert_eq!(sample(json!({"tags": ["a", null, " b "]})).tags, vec!["a", "b"]);
    }

    #[test]
    fn test_number_from_string() {
        assert_eq!(sample(json!({"budget": "$5,000"})).budget, 5000.0);
        assert_eq!(sample(json!({"budget": null})).budget, 0.0);
        let bad: Result<Sample, _> = serde_json::from_value(json!({"budget": "lots"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(sample(json!({"progress": 140})).progress, 100);
        assert_eq!(sample(json!({"progress": -3})).progress, 0);
        assert_eq!(sample(json!({"progress": "42"})).progress, 42);
    }

    #[test]
    fn test_flags() {
        assert!(sample(json!({"done": "true"})).done);
        assert!(!sample(json!({"done": null})).done);
        assert!(sample(json!({})).visible);
        assert!(sample(json!({"visible": null})).visible);
        assert!(!sample(json!({"visible": false})).visible);
    }

    #[test]
    fn test_sparse_array_keys_sort_numerically() {
        let map = json!({"10": "k", "2": "c", "0": "a"});
        let Value::Object(map) = map else { unreachable!() };
        let keys: Vec<String> = ordered_entries(map).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["0", "2", "10"]);
    }

    #[test]
    fn test_split_comma_list() {
        assert_eq!(split_comma_list(" a ,b,, c,"), vec!["a", "b", "c"]);
        assert!(split_comma_list("  , ").is_empty());
    }
}
