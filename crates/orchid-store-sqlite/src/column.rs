//! Columns of a generated table and the value types they store.

use std::{fmt, str::FromStr};

use orchid_core::jsonschema::JsonType;

use crate::{Error, Result};

// ─── Stored types ────────────────────────────────────────────────────────────

/// Relational value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoredType {
  Integer,
  BigInt,
  DoublePrecision,
  Real,
  Text,
  Boolean,
  Jsonb,
}

impl StoredType {
  pub fn as_str(self) -> &'static str {
    match self {
      StoredType::Integer => "integer",
      StoredType::BigInt => "bigint",
      StoredType::DoublePrecision => "double precision",
      StoredType::Real => "real",
      StoredType::Text => "text",
      StoredType::Boolean => "boolean",
      StoredType::Jsonb => "jsonb",
    }
  }

  /// Fixed mapping from a description kind (and `format` hint) to a stored
  /// type. Arrays map through their element kind; `None` for `array` itself.
  pub fn for_kind(kind: JsonType, format: &str) -> Option<Self> {
    Some(match (kind, format) {
      (JsonType::Integer, "int32") => StoredType::Integer,
      (JsonType::Integer, _) => StoredType::BigInt,
      (JsonType::Number, "float") => StoredType::Real,
      (JsonType::Number, _) => StoredType::DoublePrecision,
      (JsonType::String, _) => StoredType::Text,
      (JsonType::Boolean, _) => StoredType::Boolean,
      (JsonType::Object, _) => StoredType::Jsonb,
      (JsonType::Array, _) => return None,
    })
  }
}

impl FromStr for StoredType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "integer" => Ok(StoredType::Integer),
      "bigint" => Ok(StoredType::BigInt),
      "double precision" => Ok(StoredType::DoublePrecision),
      "real" => Ok(StoredType::Real),
      "text" => Ok(StoredType::Text),
      "boolean" => Ok(StoredType::Boolean),
      "jsonb" => Ok(StoredType::Jsonb),
      other => Err(Error::Validation(format!("unsupported column type {other:?}"))),
    }
  }
}

impl fmt::Display for StoredType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Column ──────────────────────────────────────────────────────────────────

/// One column of a generated table.
///
/// Rendering (`Display`) yields the type descriptor used in DDL: the base
/// type, then `[N]` or `[]` for arrays, then ` not null` when required.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
  name:             String,
  stored_type:      StoredType,
  source_type:      String,
  field:            Option<String>,
  is_array:         bool,
  max_array_length: Option<i64>,
  not_null:         bool,
}

impl Column {
  pub fn new(
    name: &str,
    stored_type: &str,
    source_type: &str,
    not_null: bool,
  ) -> Result<Self> {
    Ok(Self {
      name: valid_name(name)?,
      stored_type: stored_type.parse()?,
      source_type: source_type.to_owned(),
      field: None,
      is_array: false,
      max_array_length: None,
      not_null,
    })
  }

  /// An array column, optionally bounded to `max_length` elements.
  pub fn new_array(
    name: &str,
    stored_type: &str,
    source_type: &str,
    max_length: Option<i64>,
    not_null: bool,
  ) -> Result<Self> {
    if let Some(max) = max_length
      && max <= 0
    {
      return Err(Error::Validation(format!(
        "array column {name:?} has non-positive bound {max}"
      )));
    }
    Ok(Self {
      is_array: true,
      max_array_length: max_length,
      ..Self::new(name, stored_type, source_type, not_null)?
    })
  }

  /// Record the document property this column projects.
  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn stored_type(&self) -> StoredType { self.stored_type }

  pub fn source_type(&self) -> &str { &self.source_type }

  /// Document property projected into this column; `None` for keys and the
  /// embedded-resource column.
  pub fn field(&self) -> Option<&str> { self.field.as_deref() }

  pub fn is_array(&self) -> bool { self.is_array }

  pub fn max_array_length(&self) -> Option<i64> { self.max_array_length }

  pub fn not_null(&self) -> bool { self.not_null }
}

impl fmt::Display for Column {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.stored_type.as_str())?;
    if self.is_array {
      match self.max_array_length {
        Some(max) => write!(f, "[{max}]")?,
        None => f.write_str("[]")?,
      }
    }
    if self.not_null {
      f.write_str(" not null")?;
    }
    Ok(())
  }
}

fn valid_name(name: &str) -> Result<String> {
  let ok = name
    .chars()
    .next()
    .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
    && name
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
  if ok {
    Ok(name.to_owned())
  } else {
    Err(Error::Validation(format!("invalid column name {name:?}")))
  }
}
