use crate::util::{format_number, parse_leading_float};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub type ItemId = String; // externalId of the model element
pub type CategoryName = String;
pub type FieldName = String;

/// category -> field -> scalar
pub type PropertyBag = BTreeMap<CategoryName, BTreeMap<FieldName, PropertyValue>>;

/// A scalar stored in an item's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Numeric reading of the value; text contributes its leading numeric prefix.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(s) => parse_leading_float(s),
            PropertyValue::Null | PropertyValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            PropertyValue::Null => Cow::Borrowed("null"),
            PropertyValue::Bool(true) => Cow::Borrowed("true"),
            PropertyValue::Bool(false) => Cow::Borrowed("false"),
            PropertyValue::Number(n) => Cow::Owned(format_number(*n)),
            PropertyValue::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// One filterable model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(alias = "id", alias = "dbId")]
    pub external_id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectid: Option<u64>,
    #[serde(default)]
    pub properties: Option<PropertyBag>,
}

impl Item {
    pub fn new(external_id: impl Into<ItemId>) -> Self {
        Self {
            external_id: external_id.into(),
            name: None,
            objectid: None,
            properties: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(
        mut self,
        category: impl Into<CategoryName>,
        field: impl Into<FieldName>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties
            .get_or_insert_with(Default::default)
            .entry(category.into())
            .or_default()
            .insert(field.into(), value.into());
        self
    }
}

/// A named query kept by the saved-query store. `query` is the raw payload
/// exactly as the client submitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub query: JsonValue,
    #[serde(default = "default_created_by")]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn default_created_by() -> String {
    "anonymous".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedQuery {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query: JsonValue,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQueryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub query: Option<JsonValue>,
    #[serde(default)]
    pub created_by: Option<String>,
}
