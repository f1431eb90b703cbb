//! The flat template collected by the wizard.
//!
//! A template is an ordered label → value mapping. A handful of keys are
//! reserved: the template name, the organization identifiers, eight catalog
//! dropdown slots (`option 1..8`) and three free-form custom fields
//! (`option 9..11` with their `FieldType N` / `FieldLength N` companions).

use crate::error::ProvisionError;
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const TEMPLATE_NAME: &str = "Template Name";
pub const CUSTOMER_UNIQUE_ID: &str = "Customer Unique ID";
pub const ORG_ID: &str = "Hearsay Org ID";
pub const USER_REFERENCE_ID: &str = "Hearsay User Reference ID";

/// Value a dropdown submits before anything has been chosen.
pub const PLACEHOLDER_SELECTION: &str = "--Select--";

/// Number of `option N` slots filled from the catalog dropdowns.
pub const CATALOG_SLOTS: usize = 8;

/// Number of free-form custom fields.
pub const CUSTOM_SLOTS: usize = 3;

const FIELD_TYPE_PREFIX: &str = "FieldType ";
const FIELD_LENGTH_PREFIX: &str = "FieldLength ";
const OPTION_PREFIX: &str = "option ";

/// Key of the n-th option slot (1-based).
pub fn option_key(n: usize) -> String {
    format!("{OPTION_PREFIX}{n}")
}

/// Key holding the wire type of custom field `i` (1-based).
pub fn field_type_key(i: usize) -> String {
    format!("{FIELD_TYPE_PREFIX}{i}")
}

/// Key holding the length of custom field `i` (1-based).
pub fn field_length_key(i: usize) -> String {
    format!("{FIELD_LENGTH_PREFIX}{i}")
}

/// Key of the option slot that names custom field `i` (1-based).
pub fn custom_name_key(i: usize) -> String {
    option_key(CATALOG_SLOTS + i)
}

/// Reserved keys in the order the compiler visits them.
pub fn canonical_keys() -> Vec<String> {
    let mut keys = vec![
        TEMPLATE_NAME.to_string(),
        CUSTOMER_UNIQUE_ID.to_string(),
        ORG_ID.to_string(),
        USER_REFERENCE_ID.to_string(),
    ];
    keys.extend((1..=CATALOG_SLOTS).map(option_key));
    for i in 1..=CUSTOM_SLOTS {
        keys.push(custom_name_key(i));
        keys.push(field_type_key(i));
        keys.push(field_length_key(i));
    }
    keys
}

/// Whether `key` is one of the reserved template keys.
pub fn is_reserved(key: &str) -> bool {
    canonical_keys().iter().any(|k| k == key)
}

fn is_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == PLACEHOLDER_SELECTION
}

/// Ordered label → value mapping produced by the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Template {
    entries: IndexMap<String, String>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a template from label/value pairs, keeping their order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Inserts or replaces an entry, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Raw value of `key`, as submitted.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Trimmed value of `key`, or `None` when it is missing, blank or a
    /// dropdown placeholder.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key)
            .filter(|v| !is_blank(v))
            .map(str::trim)
    }

    /// The template name; required for every operation.
    pub fn template_name(&self) -> Result<&str, ProvisionError> {
        self.value(TEMPLATE_NAME)
            .ok_or(ProvisionError::MissingTemplateName)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose key is not reserved, in insertion order.
    pub fn extra_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !is_reserved(k))
    }

    /// The template as one flat JSON row, blank values dropped.
    pub fn to_row(&self) -> serde_json::Value {
        let row: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .filter(|(_, v)| !is_blank(v))
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::Value::Object(row)
    }
}

/// Accepts string, number and boolean values; `null` becomes an empty string.
impl<'de> Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut entries = IndexMap::with_capacity(raw.len());
        for (key, value) in raw {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "template value for '{key}' must be a scalar, got {other}"
                    )))
                }
            };
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }
}
