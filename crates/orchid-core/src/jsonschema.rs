//! The subset of OpenAPI v3 / JSON-Schema used to describe document types.
//!
//! Only the fields that drive relational mapping are modelled; anything else
//! in a CRD's `openAPIV3Schema` is ignored on deserialization.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The primitive kinds a type description can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
  Array,
  Boolean,
  String,
  Integer,
  Number,
  Object,
}

impl JsonType {
  pub fn as_str(self) -> &'static str {
    match self {
      JsonType::Array => "array",
      JsonType::Boolean => "boolean",
      JsonType::String => "string",
      JsonType::Integer => "integer",
      JsonType::Number => "number",
      JsonType::Object => "object",
    }
  }
}

impl FromStr for JsonType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "array" => Ok(JsonType::Array),
      "boolean" => Ok(JsonType::Boolean),
      "string" => Ok(JsonType::String),
      "integer" => Ok(JsonType::Integer),
      "number" => Ok(JsonType::Number),
      "object" => Ok(JsonType::Object),
      other => Err(other.to_owned()),
    }
  }
}

impl fmt::Display for JsonType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A (sub-)schema node.
///
/// `type` is kept as a raw string so an unknown kind survives parsing and can
/// be reported, with its field path, by the schema generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonSchemaProps {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_:       Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format:      Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub properties:  BTreeMap<String, JsonSchemaProps>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items:       Option<Box<JsonSchemaProps>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_items:   Option<i64>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub required:    Vec<String>,
}

impl JsonSchemaProps {
  /// A node of `type_` with an optional `format` hint (empty means none).
  pub fn new(type_: &str, format: &str) -> Self {
    Self {
      type_: Some(type_.to_owned()),
      format: (!format.is_empty()).then(|| format.to_owned()),
      ..Self::default()
    }
  }

  pub fn object<I, K>(properties: I) -> Self
  where
    I: IntoIterator<Item = (K, JsonSchemaProps)>,
    K: Into<String>,
  {
    Self {
      type_: Some("object".to_owned()),
      properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
      ..Self::default()
    }
  }

  pub fn array(items: JsonSchemaProps) -> Self {
    Self {
      type_: Some("array".to_owned()),
      items: Some(Box::new(items)),
      ..Self::default()
    }
  }

  pub fn with_required<I, S>(mut self, required: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.required = required.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_max_items(mut self, max_items: i64) -> Self {
    self.max_items = Some(max_items);
    self
  }

  /// The parsed kind; `Err` carries the unrecognised type string (empty when
  /// no type was given).
  pub fn json_type(&self) -> Result<JsonType, String> {
    self.type_.as_deref().unwrap_or_default().parse()
  }

  pub fn format(&self) -> &str { self.format.as_deref().unwrap_or_default() }

  pub fn is_required(&self, property: &str) -> bool {
    self.required.iter().any(|r| r == property)
  }
}
