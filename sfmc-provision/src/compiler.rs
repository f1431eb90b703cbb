//! Template compiler.
//!
//! Turns a wizard [`Template`] into the SOAP `CreateRequest` describing a new
//! Data Extension. Fields are emitted in a fixed canonical order so the same
//! template always produces byte-identical output.

use crate::catalog::{self, FieldSpec};
use crate::error::ProvisionError;
use crate::soap::document::{Element, XmlError};
use crate::soap::envelope::{create_request, SoapRequest};
use crate::template::{
    custom_name_key, field_length_key, field_type_key, option_key, Template, CATALOG_SLOTS,
    CUSTOMER_UNIQUE_ID, CUSTOM_SLOTS, ORG_ID, USER_REFERENCE_ID,
};
use std::collections::HashSet;
use tracing::debug;

/// Subscriber relationship used for sendable Data Extensions.
pub const SENDABLE_SUBSCRIBER_FIELD: &str = "Subscriber Key";

/// Compiled `CreateRequest` for one Data Extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapCreateDocument {
    customer_key: String,
    category_id: String,
    fields: Vec<FieldSpec>,
    request: SoapRequest,
}

impl SoapCreateDocument {
    /// `CustomerKey` (and `Name`) of the Data Extension.
    pub fn customer_key(&self) -> &str {
        &self.customer_key
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Whether the Data Extension is sendable, i.e. keyed on `Customer Unique ID`.
    pub fn is_sendable(&self) -> bool {
        self.fields.iter().any(|f| f.name == CUSTOMER_UNIQUE_ID)
    }

    pub fn request(&self) -> &SoapRequest {
        &self.request
    }

    /// Full SOAP envelope authenticated with `access_token`.
    pub fn render(&self, access_token: &str) -> Result<String, XmlError> {
        self.request.render(access_token)
    }
}

/// Compiles `template` into a `CreateRequest` placing the Data Extension in
/// folder `folder_id`.
pub fn compile(template: &Template, folder_id: &str) -> Result<SoapCreateDocument, ProvisionError> {
    let name = template.template_name()?;
    let fields = collect_fields(template)?;
    debug!(
        template = name,
        fields = fields.len(),
        "Compiling Data Extension create request"
    );

    let mut object = Element::new("Objects")
        .attr("xsi:type", "DataExtension")
        .text_child("CategoryID", folder_id)
        .text_child("CustomerKey", name)
        .text_child("Name", name);

    if let Some(key_field) = fields.iter().find(|f| f.name == CUSTOMER_UNIQUE_ID) {
        object = object
            .text_child("IsSendable", "true")
            .child(
                Element::new("SendableDataExtensionField")
                    .text_child("CustomerKey", key_field.name.as_str())
                    .text_child("Name", key_field.name.as_str())
                    .text_child("FieldType", key_field.wire_type.as_str()),
            )
            .child(
                Element::new("SendableSubscriberField")
                    .text_child("Name", SENDABLE_SUBSCRIBER_FIELD),
            );
    }

    let mut field_list = Element::new("Fields");
    for field in &fields {
        field_list.push(field_element(field));
    }
    object.push(field_list);

    Ok(SoapCreateDocument {
        customer_key: name.to_string(),
        category_id: folder_id.to_string(),
        fields,
        request: create_request(object),
    })
}

/// Resolves every non-empty template entry to a field, in canonical order.
///
/// `Template Name` is not a field, and the `FieldType N` / `FieldLength N`
/// companions only shape the custom field they belong to.
pub fn collect_fields(template: &Template) -> Result<Vec<FieldSpec>, ProvisionError> {
    let mut fields = Vec::new();

    if template.value(CUSTOMER_UNIQUE_ID).is_some() {
        fields.push(catalog::resolve(CUSTOMER_UNIQUE_ID));
    }
    if let Some(org_id) = template.value(ORG_ID) {
        fields.push(catalog::resolve_with_value(ORG_ID, org_id));
    }
    if template.value(USER_REFERENCE_ID).is_some() {
        fields.push(catalog::resolve(USER_REFERENCE_ID));
    }

    for slot in 1..=CATALOG_SLOTS {
        if let Some(label) = template.value(&option_key(slot)) {
            fields.push(catalog::resolve(label));
        }
    }

    for slot in 1..=CUSTOM_SLOTS {
        let Some(name) = template.value(&custom_name_key(slot)) else {
            continue;
        };
        let type_value = template.get(&field_type_key(slot)).unwrap_or_default();
        let length_value = template.get(&field_length_key(slot)).unwrap_or_default();
        fields.push(catalog::resolve_custom(slot, name, type_value, length_value)?);
    }

    for (key, value) in template.extra_entries() {
        if template.value(key).is_some() {
            debug!(key, value, "Unreserved template key compiled as a catalog field");
            fields.push(catalog::resolve(key));
        }
    }

    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.name.to_lowercase()) {
            return Err(ProvisionError::DuplicateField {
                name: field.name.clone(),
            });
        }
    }

    Ok(fields)
}

fn field_element(field: &FieldSpec) -> Element {
    let mut element = Element::new("Field")
        .text_child("CustomerKey", field.name.as_str())
        .text_child("Name", field.name.as_str())
        .text_child("FieldType", field.wire_type.as_str());
    if let Some(length) = field.max_length {
        element = element.text_child("MaxLength", length.to_string());
    }
    element = element
        .text_child("IsRequired", bool_text(field.required))
        .text_child("IsPrimaryKey", bool_text(field.is_primary_key));
    if let Some(default) = &field.default_value {
        element = element.text_child("DefaultValue", default.as_str());
    }
    element
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WireType;
    use crate::template::TEMPLATE_NAME;

    const TOKEN: &str = "test-token";

    fn org42() -> Template {
        Template::from_pairs([
            (TEMPLATE_NAME, "Org42"),
            (CUSTOMER_UNIQUE_ID, "x@y.com"),
            ("option 1", "Birth Date"),
        ])
    }

    fn render(template: &Template, folder: &str) -> String {
        compile(template, folder).unwrap().render(TOKEN).unwrap()
    }

    #[test]
    fn test_org42_document() {
        let xml = render(&org42(), "100");
        assert!(xml.contains("<CategoryID>100</CategoryID>"));
        assert!(xml.contains("<CustomerKey>Org42</CustomerKey><Name>Org42</Name>"));
        assert!(xml.contains(
            "<Field><CustomerKey>Birth Date</CustomerKey><Name>Birth Date</Name><FieldType>Date</FieldType><IsRequired>false</IsRequired><IsPrimaryKey>false</IsPrimaryKey></Field>"
        ));
        assert!(xml.contains("<SendableDataExtensionField><CustomerKey>Customer Unique ID</CustomerKey><Name>Customer Unique ID</Name><FieldType>EmailAddress</FieldType></SendableDataExtensionField>"));
        assert!(xml.contains("<SendableSubscriberField><Name>Subscriber Key</Name></SendableSubscriberField>"));
        assert!(xml.contains("<fueloauth xmlns=\"http://exacttarget.com\">test-token</fueloauth>"));
        assert_eq!(xml.matches("<Field>").count(), 2);
    }

    #[test]
    fn test_customer_unique_id_is_email_primary_key() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Keys"),
            (CUSTOMER_UNIQUE_ID, "a@b.com"),
        ]);
        let document = compile(&template, "1").unwrap();
        assert!(document.is_sendable());
        let field = &document.fields()[0];
        assert_eq!(field.wire_type, WireType::EmailAddress);
        assert!(field.is_primary_key);
        assert!(field.required);

        let xml = document.render(TOKEN).unwrap();
        assert!(xml.contains("<FieldType>EmailAddress</FieldType><MaxLength>254</MaxLength><IsRequired>true</IsRequired><IsPrimaryKey>true</IsPrimaryKey>"));
        assert!(xml.contains("<IsSendable>true</IsSendable>"));
    }

    #[test]
    fn test_not_sendable_without_customer_unique_id() {
        let template = Template::from_pairs([(TEMPLATE_NAME, "Plain"), ("option 1", "Email")]);
        let document = compile(&template, "1").unwrap();
        assert!(!document.is_sendable());
        let xml = document.render(TOKEN).unwrap();
        assert!(!xml.contains("Sendable"));
    }

    #[test]
    fn test_missing_template_name() {
        let template = Template::from_pairs([(TEMPLATE_NAME, ""), (CUSTOMER_UNIQUE_ID, "a@b.com")]);
        assert!(matches!(
            compile(&template, "1"),
            Err(ProvisionError::MissingTemplateName)
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Det"),
            ("option 11", "Score"),
            ("FieldType 3", "Number"),
            (ORG_ID, "ORG-9"),
            ("option 2", "Phone"),
            (CUSTOMER_UNIQUE_ID, "d@e.com"),
        ]);
        assert_eq!(render(&template, "7"), render(&template, "7"));
    }

    #[test]
    fn test_fields_follow_canonical_order_not_insertion_order() {
        let template = Template::from_pairs([
            ("option 2", "Phone"),
            ("option 9", "Renewal"),
            ("FieldType 1", "Date"),
            (USER_REFERENCE_ID, "12"),
            (TEMPLATE_NAME, "Ordered"),
            ("option 1", "Name"),
            (ORG_ID, "ORG-1"),
            (CUSTOMER_UNIQUE_ID, "o@p.com"),
        ]);
        let names: Vec<_> = compile(&template, "1")
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                CUSTOMER_UNIQUE_ID,
                ORG_ID,
                USER_REFERENCE_ID,
                "Name",
                "Phone",
                "Renewal"
            ]
        );
    }

    #[test]
    fn test_extra_keys_keep_insertion_order_from_value_and_text() {
        let text = r#"{"Template Name":"T","Zeta":"1","Alpha":"2"}"#;
        let from_text: Template = serde_json::from_str(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        let from_value: Template = serde_json::from_value(value).unwrap();

        let names = |template: &Template| -> Vec<String> {
            compile(template, "1")
                .unwrap()
                .fields()
                .iter()
                .map(|f| f.name.clone())
                .collect()
        };
        assert_eq!(names(&from_text), vec!["Zeta", "Alpha"]);
        assert_eq!(names(&from_value), names(&from_text));
        assert_eq!(render(&from_value, "1"), render(&from_text, "1"));
    }

    #[test]
    fn test_one_field_per_non_empty_entry() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Count"),
            (CUSTOMER_UNIQUE_ID, "c@d.com"),
            (ORG_ID, "ORG-2"),
            (USER_REFERENCE_ID, ""),
            ("option 1", "Name"),
            ("option 2", "Phone"),
            ("option 3", "First Name"),
            ("option 4", ""),
            ("option 5", "--Select--"),
            ("option 9", "Loyalty Tier"),
            ("FieldType 1", "Text"),
            ("FieldLength 1", "20"),
            ("option 10", ""),
            ("FieldType 2", "Number"),
            ("Region", "EMEA"),
        ]);
        let xml = render(&template, "1");
        assert_eq!(xml.matches("<Field>").count(), 7);
    }

    #[test]
    fn test_org_id_default_value() {
        let template = Template::from_pairs([(TEMPLATE_NAME, "Org"), (ORG_ID, "ORG-77")]);
        let xml = render(&template, "1");
        assert!(xml.contains(
            "<Name>Hearsay Org ID</Name><FieldType>Text</FieldType><MaxLength>50</MaxLength><IsRequired>false</IsRequired><IsPrimaryKey>false</IsPrimaryKey><DefaultValue>ORG-77</DefaultValue>"
        ));
    }

    #[test]
    fn test_custom_fields_pair_positionally() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Custom"),
            ("option 9", "Renewal Date"),
            ("FieldType 1", "Date"),
            ("FieldLength 1", "10"),
            ("option 10", "Notes"),
            ("FieldType 2", "Text"),
            ("FieldLength 2", "500"),
            ("option 11", "Opted In"),
            ("FieldType 3", "Boolean"),
        ]);
        let document = compile(&template, "1").unwrap();
        let fields = document.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].wire_type, WireType::Date);
        assert_eq!(fields[0].max_length, None);
        assert_eq!(fields[1].max_length, Some(500));
        assert_eq!(fields[2].wire_type, WireType::Boolean);
        assert!(fields.iter().all(|f| !f.required));
    }

    #[test]
    fn test_custom_field_with_unknown_type_fails() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Bad"),
            ("option 10", "Blob"),
            ("FieldType 2", "Binary"),
        ]);
        assert!(matches!(
            compile(&template, "1"),
            Err(ProvisionError::UnresolvedFieldType { slot: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_labels_degrade_to_text() {
        let template = Template::from_pairs([(TEMPLATE_NAME, "Lenient"), ("option 4", "Nickname")]);
        let document = compile(&template, "1").unwrap();
        assert_eq!(document.fields()[0], FieldSpec::text("Nickname"));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Dupes"),
            ("option 3", "Email"),
            ("option 9", "email"),
        ]);
        assert!(matches!(
            compile(&template, "1"),
            Err(ProvisionError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_values_are_escaped() {
        let template = Template::from_pairs([
            (TEMPLATE_NAME, "Smith & <Sons>"),
            ("option 9", "Q&A \"score\""),
        ]);
        let xml = render(&template, "1");
        assert!(xml.contains("<CustomerKey>Smith &amp; &lt;Sons&gt;</CustomerKey>"));
        assert!(xml.contains("<Name>Q&amp;A &quot;score&quot;</Name>"));
        assert!(crate::soap::XmlNode::parse(&xml).is_ok());
    }
}
