//! Forgiving field deserializers for model-produced JSON.
//!
//! The extraction model is asked for strings but sometimes answers with
//! numbers, booleans or `null`. Use with
//! `#[serde(default, deserialize_with = "lenient::...")]` on struct fields so
//! such values are kept instead of failing the whole analysis.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render any JSON scalar as display text. `null` becomes empty.
fn value_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// A string field that also accepts numbers, booleans and `null`.
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Value::deserialize(d).map(value_text)
}

/// A list of strings that may be `null` or contain non-string scalars.
/// A lone scalar is taken as a one-element list.
pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(d)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        single => vec![single],
    };
    Ok(items
        .into_iter()
        .filter(|v| !v.is_null())
        .map(value_text)
        .collect())
}

/// Any defaultable field where `null` means "absent".
pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// A graded enum field whose value may arrive as a non-string scalar.
pub fn grade<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    text(d).map(T::from)
}
