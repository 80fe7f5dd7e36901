//! Lorebook entry and key normalization.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Characters that separate several keys packed into one key string.
pub const KEY_SEPARATORS: &[char] = &[',', '|', ';', '，', '；'];

fn default_true() -> bool {
    true
}

fn string_items(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Accept a key list, a single key string, or null. Non-string items are dropped.
fn lenient_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(items) => string_items(items),
        _ => Vec::new(),
    })
}

/// Like [`lenient_keys`], but null or a non-list stays `None`.
fn lenient_key_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(vec![s]),
        Value::Array(items) => Some(string_items(items)),
        _ => None,
    })
}

/// Decode as `T`, falling back to `T::default()` on null or a mistyped value.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Missing, null or non-boolean means enabled.
fn lenient_enabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool().unwrap_or(true))
}

/// Integer order; floats are truncated, anything else is 0.
fn lenient_order<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0))
}

/// One keyword-triggered snippet. Unknown keys are kept in `extra`.
///
/// Every field decodes leniently: null or a value of the wrong type falls back to the field's
/// default rather than rejecting the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LorebookEntry {
    #[serde(default, deserialize_with = "lenient_keys")]
    pub keys: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub extensions: Map<String, Value>,
    #[serde(default = "default_true", deserialize_with = "lenient_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient_order")]
    pub insertion_order: i64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    /// Stored only; the scanner always matches literally.
    #[serde(default, deserialize_with = "lenient")]
    pub use_regex: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub selective: Option<bool>,
    #[serde(default, deserialize_with = "lenient_key_list", skip_serializing_if = "Option::is_none")]
    pub secondary_keys: Option<Vec<String>>,
    /// "before_char" / "after_char" in v2 cards; some editors write a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LorebookEntry {
    /// Entry with the given keys and content; everything else defaulted.
    pub fn new<K, S>(keys: K, content: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            content: content.into(),
            extensions: Map::new(),
            enabled: true,
            insertion_order: 0,
            case_sensitive: None,
            use_regex: false,
            constant: None,
            name: None,
            priority: None,
            id: None,
            comment: None,
            selective: None,
            secondary_keys: None,
            position: None,
            extra: Map::new(),
        }
    }

    /// Split keys that pack several triggers ("red, blue") into separate trimmed keys.
    pub fn fix_keys(&mut self) {
        self.keys = split_keys(&self.keys);
    }

    /// Literal, case-sensitive substring match of any key.
    pub fn matches(&self, context: &str) -> bool {
        self.keys.iter().any(|k| context.contains(k.as_str()))
    }
}

/// Expand separator-packed keys; keys without a separator pass through unchanged.
pub fn split_keys(keys: &[String]) -> Vec<String> {
    let mut fixed = Vec::with_capacity(keys.len());
    for key in keys {
        if key.contains(KEY_SEPARATORS) {
            fixed.extend(
                key.split(KEY_SEPARATORS)
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        } else {
            fixed.push(key.clone());
        }
    }
    fixed
}
