//! Field-type catalog.
//!
//! Maps the semantic labels offered by the wizard dropdowns ("Birth Date",
//! "Email", ...) to the wire type, length and flags of a Data Extension field.
//! Lookups are total: anything the catalog does not know becomes a generic
//! optional `Text` field (see [`resolve`]).

use crate::error::ProvisionError;
use crate::template::{CUSTOMER_UNIQUE_ID, ORG_ID, PLACEHOLDER_SELECTION};
use std::fmt;

/// Length given to text fields the catalog has no specific entry for.
pub const DEFAULT_TEXT_LENGTH: u32 = 100;

/// Value the custom type dropdown submits when nothing was chosen.
const UNSELECTED_TYPE: &str = "0";

/// Data Extension field types understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Text,
    EmailAddress,
    Phone,
    Date,
    Decimal,
    Boolean,
    Locale,
    Number,
}

impl WireType {
    pub const ALL: [WireType; 8] = [
        WireType::Text,
        WireType::EmailAddress,
        WireType::Phone,
        WireType::Date,
        WireType::Decimal,
        WireType::Boolean,
        WireType::Locale,
        WireType::Number,
    ];

    /// Name used in the `FieldType` element.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireType::Text => "Text",
            WireType::EmailAddress => "EmailAddress",
            WireType::Phone => "Phone",
            WireType::Date => "Date",
            WireType::Decimal => "Decimal",
            WireType::Boolean => "Boolean",
            WireType::Locale => "Locale",
            WireType::Number => "Number",
        }
    }

    /// Parses a wire type name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<WireType> {
        let value = value.trim();
        WireType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved description of one Data Extension field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub wire_type: WireType,
    pub max_length: Option<u32>,
    pub required: bool,
    pub is_primary_key: bool,
    pub default_value: Option<String>,
}

impl FieldSpec {
    /// Optional text field with the default length.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_type: WireType::Text,
            max_length: Some(DEFAULT_TEXT_LENGTH),
            required: false,
            is_primary_key: false,
            default_value: None,
        }
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

struct CatalogEntry {
    label: &'static str,
    wire_type: WireType,
    max_length: Option<u32>,
    required: bool,
    primary_key: bool,
    /// The submitted value becomes the field's default value
    value_as_default: bool,
    /// Offered in the wizard's cascading dropdowns
    selectable: bool,
}

impl CatalogEntry {
    const fn option(label: &'static str, wire_type: WireType, max_length: Option<u32>) -> Self {
        Self {
            label,
            wire_type,
            max_length,
            required: false,
            primary_key: false,
            value_as_default: false,
            selectable: true,
        }
    }

    const fn fixed(label: &'static str, wire_type: WireType, max_length: Option<u32>) -> Self {
        Self {
            selectable: false,
            ..Self::option(label, wire_type, max_length)
        }
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry::option("Birth Date", WireType::Date, None),
    CatalogEntry::option("Email", WireType::EmailAddress, Some(254)),
    CatalogEntry::option("First Name", WireType::Text, Some(50)),
    CatalogEntry::option("Last Name", WireType::Text, Some(50)),
    CatalogEntry::option("Preferred Name", WireType::Text, Some(50)),
    CatalogEntry::option("Title", WireType::Text, Some(100)),
    CatalogEntry::fixed("Name", WireType::Text, Some(100)),
    CatalogEntry::fixed("Phone", WireType::Phone, None),
    CatalogEntry {
        required: true,
        primary_key: true,
        ..CatalogEntry::fixed(CUSTOMER_UNIQUE_ID, WireType::EmailAddress, Some(254))
    },
    CatalogEntry {
        value_as_default: true,
        ..CatalogEntry::fixed(ORG_ID, WireType::Text, Some(50))
    },
];

fn lookup(label: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.label == label)
}

/// Resolves a label to its field specification.
///
/// Labels without a catalog entry fall back to [`FieldSpec::text`]: an
/// optional `Text` field of [`DEFAULT_TEXT_LENGTH`] named after the label.
pub fn resolve(label: &str) -> FieldSpec {
    let label = label.trim();
    match lookup(label) {
        Some(entry) => FieldSpec {
            name: label.to_string(),
            wire_type: entry.wire_type,
            max_length: entry.max_length,
            required: entry.required,
            is_primary_key: entry.primary_key,
            default_value: None,
        },
        None => FieldSpec::text(label),
    }
}

/// Resolves a reserved key whose submitted value may become the field default.
pub fn resolve_with_value(label: &str, value: &str) -> FieldSpec {
    let spec = resolve(label);
    match lookup(label.trim()) {
        Some(entry) if entry.value_as_default => spec.with_default_value(value.trim()),
        _ => spec,
    }
}

/// Resolves one of the three free-form custom fields.
///
/// `slot` is 1-based and only used for error reporting. An unselected type
/// falls back to `Text`; `Date` fields never carry a length.
pub fn resolve_custom(
    slot: usize,
    name: &str,
    type_value: &str,
    length_value: &str,
) -> Result<FieldSpec, ProvisionError> {
    let type_value = type_value.trim();
    let wire_type = if is_unselected_type(type_value) {
        WireType::Text
    } else {
        WireType::parse(type_value).ok_or_else(|| ProvisionError::UnresolvedFieldType {
            slot,
            value: type_value.to_string(),
        })?
    };

    let length_value = length_value.trim();
    let max_length = match wire_type {
        WireType::Date => None,
        _ if length_value.is_empty() => match wire_type {
            WireType::Text => Some(DEFAULT_TEXT_LENGTH),
            _ => None,
        },
        _ => match length_value.parse::<u32>() {
            Ok(length) if length > 0 => Some(length),
            _ => {
                return Err(ProvisionError::InvalidFieldLength {
                    slot,
                    value: length_value.to_string(),
                })
            }
        },
    };

    Ok(FieldSpec {
        name: name.trim().to_string(),
        wire_type,
        max_length,
        required: false,
        is_primary_key: false,
        default_value: None,
    })
}

fn is_unselected_type(value: &str) -> bool {
    value.is_empty() || value == UNSELECTED_TYPE || value == PLACEHOLDER_SELECTION
}

/// Labels offered in the wizard dropdowns, in display order.
pub fn selectable_labels() -> impl Iterator<Item = &'static str> {
    CATALOG
        .iter()
        .filter(|entry| entry.selectable)
        .map(|entry| entry.label)
}

/// Dropdown options still available given the selections made in sibling
/// dropdowns. A label chosen anywhere is not offered again.
pub fn available_options<S: AsRef<str>>(selected: &[S]) -> Vec<&'static str> {
    selectable_labels()
        .filter(|label| !selected.iter().any(|s| s.as_ref().trim() == *label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_resolve_to_catalog_types() {
        assert_eq!(resolve("Birth Date").wire_type, WireType::Date);
        assert_eq!(resolve("Birth Date").max_length, None);
        assert_eq!(resolve("Email").wire_type, WireType::EmailAddress);
        assert_eq!(resolve("Phone").wire_type, WireType::Phone);
        assert_eq!(resolve("First Name").max_length, Some(50));
        assert_eq!(resolve("Title").wire_type, WireType::Text);
    }

    #[test]
    fn test_customer_unique_id_is_required_primary_key() {
        let spec = resolve(CUSTOMER_UNIQUE_ID);
        assert_eq!(spec.wire_type, WireType::EmailAddress);
        assert!(spec.required);
        assert!(spec.is_primary_key);
    }

    #[test]
    fn test_unknown_label_falls_back_to_text() {
        let spec = resolve("Favourite Colour");
        assert_eq!(spec, FieldSpec::text("Favourite Colour"));
        assert!(!spec.required);
    }

    #[test]
    fn test_org_id_carries_value_as_default() {
        let spec = resolve_with_value(ORG_ID, " ORG-1 ");
        assert_eq!(spec.wire_type, WireType::Text);
        assert_eq!(spec.default_value.as_deref(), Some("ORG-1"));

        let plain = resolve_with_value("Title", "Manager");
        assert_eq!(plain.default_value, None);
    }

    #[test]
    fn test_custom_field_types() {
        let spec = resolve_custom(1, "Renewal", "Date", "20").unwrap();
        assert_eq!(spec.wire_type, WireType::Date);
        assert_eq!(spec.max_length, None);
        assert!(!spec.required);

        let spec = resolve_custom(2, "Notes", "text", "500").unwrap();
        assert_eq!(spec.wire_type, WireType::Text);
        assert_eq!(spec.max_length, Some(500));

        let spec = resolve_custom(3, "Score", "0", "").unwrap();
        assert_eq!(spec.wire_type, WireType::Text);
        assert_eq!(spec.max_length, Some(DEFAULT_TEXT_LENGTH));

        let spec = resolve_custom(3, "Active", "Boolean", "").unwrap();
        assert_eq!(spec.max_length, None);
    }

    #[test]
    fn test_custom_field_rejects_unknown_type() {
        let error = resolve_custom(2, "Blob", "Binary", "").unwrap_err();
        assert!(matches!(
            error,
            ProvisionError::UnresolvedFieldType { slot: 2, ref value } if value == "Binary"
        ));
    }

    #[test]
    fn test_custom_field_rejects_bad_length() {
        let error = resolve_custom(1, "Notes", "Text", "long").unwrap_err();
        assert!(matches!(error, ProvisionError::InvalidFieldLength { slot: 1, .. }));
        assert!(resolve_custom(1, "Notes", "Text", "0").is_err());
    }

    #[test]
    fn test_available_options_excludes_selected() {
        let all = available_options::<&str>(&[]);
        assert_eq!(
            all,
            vec![
                "Birth Date",
                "Email",
                "First Name",
                "Last Name",
                "Preferred Name",
                "Title"
            ]
        );

        let remaining = available_options(&["Email", "Title", "--Select--"]);
        assert_eq!(
            remaining,
            vec!["Birth Date", "First Name", "Last Name", "Preferred Name"]
        );
    }

    #[test]
    fn test_wire_type_parse() {
        assert_eq!(WireType::parse(" emailaddress "), Some(WireType::EmailAddress));
        assert_eq!(WireType::parse("Locale"), Some(WireType::Locale));
        assert_eq!(WireType::parse("Email Address"), None);
    }
}
