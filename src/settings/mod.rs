//! Query settings and the three-layer cascade that resolves them.
//!
//! Resolution order for every key is per-call, then per-session, then process-wide.
//! Overrides are loosely keyed: `rowsIndexed`, `rows_indexed` and `ROWS-INDEXED` all name
//! the same setting, and unknown keys are dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SqlStencilError;
use crate::translation::DelimiterPair;

mod defaults;
mod keys;

pub use defaults::{configure_defaults, defaults, reset_defaults};
pub use keys::{SettingKey, canonicalize};

/// Fully resolved options governing one query call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Connection charset applied before each statement.
    pub charset: String,
    /// Largest row count inlined into one multi-row INSERT; above it rows are bulk loaded.
    /// Negative disables bulk loading entirely.
    pub max_insert_rows: i64,
    /// Zero rows yield an empty collection instead of `false`.
    pub no_rows_as_array: bool,
    /// Single-column rows collapse to their value.
    pub omit_single_key: bool,
    /// Keep a single row wrapped in a collection.
    pub rows_indexed: bool,
    /// Tokens marking template literals.
    pub delimiters: DelimiterPair,
    /// Tokens marking trusted raw SQL in bulk-insert values.
    pub raw_fragment: DelimiterPair,
    /// Surface execution errors instead of only recording them.
    pub throw_errors: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            charset: "utf8".to_string(),
            max_insert_rows: 1000,
            no_rows_as_array: true,
            omit_single_key: false,
            rows_indexed: false,
            delimiters: DelimiterPair::default(),
            raw_fragment: DelimiterPair::new("{", "}"),
            throw_errors: true,
        }
    }
}

impl QuerySettings {
    /// Resolve `overrides` on top of these settings.
    ///
    /// # Errors
    /// Returns `ConfigError` when a recognized key carries a value of the wrong shape.
    pub fn with_overrides(&self, overrides: &SettingsOverrides) -> Result<Self, SqlStencilError> {
        normalize(overrides, self)
    }

    fn apply(&mut self, key: SettingKey, value: &Value) -> Result<(), SqlStencilError> {
        match key {
            SettingKey::Charset => {
                self.charset = value
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(key, value))?
                    .to_string();
            }
            SettingKey::MaxInsertRows => {
                self.max_insert_rows = value.as_i64().ok_or_else(|| invalid(key, value))?;
            }
            SettingKey::NoRowsAsArray => self.no_rows_as_array = flag(key, value)?,
            SettingKey::OmitSingleKey => self.omit_single_key = flag(key, value)?,
            SettingKey::RowsIndexed => self.rows_indexed = flag(key, value)?,
            SettingKey::ThrowErrors => self.throw_errors = flag(key, value)?,
            SettingKey::Delimiters => self.delimiters = pair(key, value)?,
            SettingKey::RawFragment => self.raw_fragment = pair(key, value)?,
        }
        Ok(())
    }
}

/// Sparse, loosely keyed set of setting overrides.
///
/// ```rust
/// use sql_stencil::prelude::*;
///
/// let overrides = SettingsOverrides::new()
///     .set("rowsIndexed", true)
///     .set("charset", "utf16");
/// let effective = QuerySettings::default().with_overrides(&overrides).unwrap();
/// assert!(effective.rows_indexed);
/// assert_eq!(effective.charset, "utf16");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsOverrides(Map<String, Value>);

impl SettingsOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an override, builder style.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Build overrides from a JSON object.
    ///
    /// # Errors
    /// Returns `ConfigError` if `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self, SqlStencilError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SqlStencilError::ConfigError(format!(
                "settings overrides must be a JSON object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SettingsOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Merge `overrides` onto `base`: recognized keys replace the base value, unknown keys are
/// dropped, and keys absent from `overrides` keep the base value.
///
/// # Errors
/// Returns `ConfigError` when a recognized key carries a value of the wrong shape.
pub fn normalize(
    overrides: &SettingsOverrides,
    base: &QuerySettings,
) -> Result<QuerySettings, SqlStencilError> {
    let mut effective = base.clone();
    for (name, value) in overrides.iter() {
        match SettingKey::parse(name) {
            Some(key) => effective.apply(key, value)?,
            None => tracing::debug!(setting = %name, "dropping unknown setting"),
        }
    }
    Ok(effective)
}

fn invalid(key: SettingKey, value: &Value) -> SqlStencilError {
    SqlStencilError::ConfigError(format!(
        "invalid value {value} for setting `{}`",
        key.canonical()
    ))
}

fn flag(key: SettingKey, value: &Value) -> Result<bool, SqlStencilError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        _ => Err(invalid(key, value)),
    }
}

fn pair(key: SettingKey, value: &Value) -> Result<DelimiterPair, SqlStencilError> {
    let pair: DelimiterPair =
        serde_json::from_value(value.clone()).map_err(|_| invalid(key, value))?;
    if pair.is_usable() {
        Ok(pair)
    } else {
        Err(invalid(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_layers_cascade() {
        let process = QuerySettings::default()
            .with_overrides(&SettingsOverrides::new().set("rowsIndexed", false).set("charset", "utf8"))
            .unwrap();
        let session = normalize(&SettingsOverrides::new().set("rows_indexed", true), &process).unwrap();
        let call = normalize(&SettingsOverrides::new().set("CHARSET", "utf16"), &session).unwrap();

        assert!(call.rows_indexed);
        assert_eq!(call.charset, "utf16");
        assert_eq!(call.max_insert_rows, process.max_insert_rows);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let overrides = SettingsOverrides::new().set("favouriteColour", "teal");
        let effective = normalize(&overrides, &QuerySettings::default()).unwrap();
        assert_eq!(effective, QuerySettings::default());
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let bad = [
            SettingsOverrides::new().set("throwErrors", "yes"),
            SettingsOverrides::new().set("maxInsertRows", 2.5),
            SettingsOverrides::new().set("delimiters", json!(["<%"])),
            SettingsOverrides::new().set("delimiters", json!(["", "%>"])),
            SettingsOverrides::new().set("charset", ""),
        ];
        for overrides in bad {
            assert!(
                matches!(
                    normalize(&overrides, &QuerySettings::default()),
                    Err(SqlStencilError::ConfigError(_))
                ),
                "{overrides:?}"
            );
        }
    }

    #[test]
    fn delimiter_pair_from_json_array() {
        let overrides = SettingsOverrides::from_json(json!({
            "delimiters": ["{{", "}}"],
            "omit_single_key": 1,
            "max-insert-rows": -1
        }))
        .unwrap();
        let effective = normalize(&overrides, &QuerySettings::default()).unwrap();
        assert_eq!(effective.delimiters, DelimiterPair::new("{{", "}}"));
        assert!(effective.omit_single_key);
        assert_eq!(effective.max_insert_rows, -1);
    }

    #[test]
    fn overrides_must_be_an_object() {
        assert!(SettingsOverrides::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn settings_serialize_with_snake_case_keys() {
        let value = serde_json::to_value(QuerySettings::default()).unwrap();
        assert_eq!(value["delimiters"], json!(["<%", "%>"]));
        assert_eq!(value["throw_errors"], json!(true));
    }
}
