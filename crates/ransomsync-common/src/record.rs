//! Incident record shapes
//!
//! [`RawRecord`] mirrors a feed object as loosely as possible: every field is
//! optional and scalar values of any JSON type are accepted. [`CanonicalRecord`]
//! is the normalized shape stored in a year partition.

use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An incident object as returned by the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub activity: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub post_title: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub group_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub discovered: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub published: Option<String>,
}

impl RawRecord {
    /// Convert one element of the feed array.
    ///
    /// Elements that are not JSON objects yield `Ok(None)` and are skipped by
    /// callers.
    pub fn from_value(value: Value) -> Result<Option<Self>> {
        if !value.is_object() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Accept strings, numbers and booleans; anything else counts as absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A normalized incident, ready to be stored in its year partition.
///
/// `discovered_date` is always present and its year matches the partition the
/// record belongs to. `sector` and `group_name` are never blank: missing values
/// are replaced with [`OTHER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub sector: String,
    pub country: String,
    pub post_title: String,
    pub group_name: String,
    pub discovered_date: NaiveDateTime,
    pub attack_date: Option<NaiveDateTime>,
    pub month: i32,
}

/// Sentinel used for missing sector and group values.
pub const OTHER: &str = "Other";
