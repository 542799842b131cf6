//! Field specifications and the schema they form.
//!
//! A [`Schema`] is the declarative description of one record: which node to
//! look for inside an entry, how to read it, how to clean the value up, and
//! what to do when the node is not there. Schemas are plain data; they load
//! from JSON job files and validate themselves on construction.
//!
//! ```json
//! {
//!   "name": "Email",
//!   "locator": "a[href^='mailto:']",
//!   "accessor": { "attribute": "href" },
//!   "transform": [{ "strip_prefix": "mailto:" }, "lowercase"],
//!   "on_missing": { "substitute": "N/A" }
//! }
//! ```

use crate::error::{validate_selector, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a located node is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    /// The rendered text of the node.
    #[default]
    Text,
    /// The value of the named attribute. An absent attribute counts as a
    /// missing match.
    Attribute(String),
}

/// A single text clean-up step. Steps run in the order they are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    /// Remove a literal prefix if present.
    StripPrefix(String),
    /// Remove a literal suffix if present.
    StripSuffix(String),
    /// Trim surrounding whitespace.
    Trim,
    /// Lower-case the whole value.
    Lowercase,
}

impl TextOp {
    /// Apply this step to `value`.
    pub fn apply(&self, value: String) -> String {
        match self {
            TextOp::StripPrefix(prefix) => match value.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.to_string(),
                None => value,
            },
            TextOp::StripSuffix(suffix) => match value.strip_suffix(suffix.as_str()) {
                Some(rest) => rest.to_string(),
                None => value,
            },
            TextOp::Trim => value.trim().to_string(),
            TextOp::Lowercase => value.to_lowercase(),
        }
    }
}

/// What happens when a field's locator matches nothing inside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    /// Drop the whole entry and log the missing field.
    #[default]
    FailEntry,
    /// Use the given sentinel and keep going.
    Substitute(String),
}

/// Description of one extractable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Output column name. Unique within a schema.
    pub name: String,
    /// CSS selector evaluated against the entry's descendants.
    pub locator: String,
    #[serde(default)]
    pub accessor: Accessor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TextOp>,
    #[serde(default)]
    pub on_missing: OnMissing,
}

impl FieldSpec {
    /// A field read from the located node's text.
    pub fn text(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            accessor: Accessor::Text,
            transform: Vec::new(),
            on_missing: OnMissing::FailEntry,
        }
    }

    /// A field read from an attribute of the located node.
    pub fn attribute(
        name: impl Into<String>,
        locator: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            accessor: Accessor::Attribute(attribute.into()),
            ..Self::text(name, locator)
        }
    }

    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.transform.push(TextOp::StripPrefix(prefix.into()));
        self
    }

    pub fn strip_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.transform.push(TextOp::StripSuffix(suffix.into()));
        self
    }

    pub fn trim(mut self) -> Self {
        self.transform.push(TextOp::Trim);
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.transform.push(TextOp::Lowercase);
        self
    }

    /// Substitute `sentinel` instead of failing the entry.
    pub fn or_substitute(mut self, sentinel: impl Into<String>) -> Self {
        self.on_missing = OnMissing::Substitute(sentinel.into());
        self
    }

    /// Run the transform steps over a raw value.
    pub fn apply_transform(&self, raw: String) -> String {
        self.transform.iter().fold(raw, |value, op| op.apply(value))
    }
}

/// An ordered, validated set of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Validate and build a schema. Fails on duplicate or blank names, blank
    /// locators, unparsable selectors, or an empty field list.
    pub fn new(fields: Vec<FieldSpec>) -> ConfigResult<Self> {
        if fields.is_empty() {
            return Err(ConfigError::EmptySchema);
        }

        let mut seen = HashSet::new();
        for (i, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ConfigError::BlankFieldName(i));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
            if field.locator.trim().is_empty() {
                return Err(ConfigError::BlankValue {
                    field: field.name.clone(),
                    what: "locator",
                });
            }
            if let Accessor::Attribute(attr) = &field.accessor {
                if attr.trim().is_empty() {
                    return Err(ConfigError::BlankValue {
                        field: field.name.clone(),
                        what: "attribute name",
                    });
                }
            }
            validate_selector(&format!("field {:?}", field.name), &field.locator)?;
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field names in output column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Vec<FieldSpec>> for Schema {
    type Error = ConfigError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<FieldSpec> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Schema::new(vec![
            FieldSpec::text("Type", "p"),
            FieldSpec::text("Name", "span"),
            FieldSpec::text("Type", "div"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateField("Type".to_string()));
    }

    #[test]
    fn test_empty_and_blank_rejected() {
        assert_eq!(Schema::new(vec![]).unwrap_err(), ConfigError::EmptySchema);
        assert_eq!(
            Schema::new(vec![FieldSpec::text("  ", "p")]).unwrap_err(),
            ConfigError::BlankFieldName(0)
        );
        assert!(matches!(
            Schema::new(vec![FieldSpec::text("A", "")]).unwrap_err(),
            ConfigError::BlankValue { what: "locator", .. }
        ));
        assert!(matches!(
            Schema::new(vec![FieldSpec::attribute("A", "a", " ")]).unwrap_err(),
            ConfigError::BlankValue { what: "attribute name", .. }
        ));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let err = Schema::new(vec![FieldSpec::text("A", "div[[")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { .. }));
    }

    #[test]
    fn test_column_order_is_insertion_order() {
        let schema = Schema::new(vec![
            FieldSpec::text("Zeta", "p"),
            FieldSpec::text("Alpha", "span"),
        ])
        .unwrap();
        assert_eq!(schema.column_names(), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_transform_chain() {
        let mc = FieldSpec::text("MC", "b").strip_prefix("MC#").trim();
        assert_eq!(mc.apply_transform("MC# 123456 ".to_string()), "123456");

        let email = FieldSpec::attribute("Email", "a", "href")
            .strip_prefix("mailto:")
            .lowercase();
        assert_eq!(
            email.apply_transform("mailto:A@X.com".to_string()),
            "a@x.com"
        );

        // Prefix absent: value passes through untouched.
        assert_eq!(mc.apply_transform("123".to_string()), "123");
        assert_eq!(
            TextOp::StripSuffix(" LLC".into()).apply("ACME LLC".into()),
            "ACME"
        );
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"[
            {"name": "Type", "locator": "p.kind"},
            {"name": "Email", "locator": "a[href^='mailto:']",
             "accessor": {"attribute": "href"},
             "transform": [{"strip_prefix": "mailto:"}, "lowercase"],
             "on_missing": {"substitute": "N/A"}}
        ]"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.fields()[0].accessor, Accessor::Text);
        assert_eq!(schema.fields()[0].on_missing, OnMissing::FailEntry);
        assert_eq!(
            schema.fields()[1].accessor,
            Accessor::Attribute("href".to_string())
        );
        assert_eq!(
            schema.fields()[1].on_missing,
            OnMissing::Substitute("N/A".to_string())
        );
    }

    #[test]
    fn test_schema_json_duplicate_fails() {
        let json = r#"[{"name": "A", "locator": "p"}, {"name": "A", "locator": "q"}]"#;
        let err = serde_json::from_str::<Schema>(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate field name"));
    }
}
