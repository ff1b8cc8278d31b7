//! Encoding and decoding between document values and SQLite column values.
//!
//! Booleans are stored as `0`/`1`. Array columns and `jsonb` columns hold
//! compact JSON text. SQLite applies column affinity on insert, so decoding
//! is lenient: a `jsonb` column may hand back a number it converted from the
//! JSON text, and a floating column may hand back an integer.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde_json::Value;

use crate::{
  Error, Result,
  column::{Column, StoredType},
};

/// A typed cell, either bound to a statement or scanned from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Boolean(bool),
  Json(Value),
}

impl SqlValue {
  pub fn is_null(&self) -> bool { matches!(self, SqlValue::Null) }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      SqlValue::Integer(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      SqlValue::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Convert back into a document value.
  pub fn into_json(self) -> Value {
    match self {
      SqlValue::Null => Value::Null,
      SqlValue::Integer(i) => Value::from(i),
      SqlValue::Real(f) => Value::from(f),
      SqlValue::Text(s) => Value::String(s),
      SqlValue::Boolean(b) => Value::Bool(b),
      SqlValue::Json(v) => v,
    }
  }
}

impl From<&str> for SqlValue {
  fn from(s: &str) -> Self { SqlValue::Text(s.to_owned()) }
}

impl From<String> for SqlValue {
  fn from(s: String) -> Self { SqlValue::Text(s) }
}

impl From<i64> for SqlValue {
  fn from(i: i64) -> Self { SqlValue::Integer(i) }
}

impl ToSql for SqlValue {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(match self {
      SqlValue::Null => ToSqlOutput::from(rusqlite::types::Null),
      SqlValue::Integer(i) => ToSqlOutput::from(*i),
      SqlValue::Real(f) => ToSqlOutput::from(*f),
      SqlValue::Text(s) => ToSqlOutput::from(s.as_str()),
      SqlValue::Boolean(b) => ToSqlOutput::from(*b),
      SqlValue::Json(v) => ToSqlOutput::from(
        serde_json::to_string(v)
          .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
      ),
    })
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Per-column decoder, derived from the schema before a result is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
  stored_type: StoredType,
  is_array:    bool,
}

impl Decoder {
  pub fn for_column(column: &Column) -> Self {
    Self {
      stored_type: column.stored_type(),
      is_array:    column.is_array(),
    }
  }

  /// Decode the raw cell `value` of the column keyed `key`.
  pub fn decode(&self, key: &str, value: ValueRef<'_>) -> Result<SqlValue> {
    if let ValueRef::Null = value {
      return Ok(SqlValue::Null);
    }
    if self.is_array {
      return json(key, value);
    }

    match (self.stored_type, value) {
      (StoredType::Integer | StoredType::BigInt, ValueRef::Integer(i)) => Ok(SqlValue::Integer(i)),
      (StoredType::Real | StoredType::DoublePrecision, ValueRef::Real(f)) => Ok(SqlValue::Real(f)),
      (StoredType::Real | StoredType::DoublePrecision, ValueRef::Integer(i)) => {
        Ok(SqlValue::Real(i as f64))
      }
      (StoredType::Text, ValueRef::Text(bytes)) => Ok(SqlValue::Text(utf8(key, bytes)?.to_owned())),
      (StoredType::Boolean, ValueRef::Integer(i)) => Ok(SqlValue::Boolean(i != 0)),
      (StoredType::Jsonb, value) => json(key, value),
      (stored, value) => Err(decode_error(
        key,
        format!("{:?} value in {stored} column", value.data_type()),
      )),
    }
  }
}

fn json(key: &str, value: ValueRef<'_>) -> Result<SqlValue> {
  match value {
    ValueRef::Text(bytes) => serde_json::from_str(utf8(key, bytes)?)
      .map(SqlValue::Json)
      .map_err(|e| decode_error(key, e.to_string())),
    ValueRef::Integer(i) => Ok(SqlValue::Json(Value::from(i))),
    ValueRef::Real(f) => Ok(SqlValue::Json(Value::from(f))),
    ValueRef::Null => Ok(SqlValue::Null),
    ValueRef::Blob(_) => Err(decode_error(key, "blob value in json column".into())),
  }
}

fn utf8<'a>(key: &str, bytes: &'a [u8]) -> Result<&'a str> {
  std::str::from_utf8(bytes).map_err(|e| decode_error(key, e.to_string()))
}

fn decode_error(key: &str, reason: String) -> Error {
  Error::Decode {
    column: key.to_owned(),
    reason,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn decoder(stored: &str) -> Decoder {
    Decoder::for_column(&Column::new("c", stored, "string", false).unwrap())
  }

  #[test]
  fn decodes_by_stored_type() {
    assert_eq!(
      decoder("integer").decode("t.c", ValueRef::Integer(7)).unwrap(),
      SqlValue::Integer(7)
    );
    assert_eq!(
      decoder("double precision").decode("t.c", ValueRef::Integer(2)).unwrap(),
      SqlValue::Real(2.0)
    );
    assert_eq!(
      decoder("boolean").decode("t.c", ValueRef::Integer(1)).unwrap(),
      SqlValue::Boolean(true)
    );
    assert_eq!(
      decoder("jsonb").decode("t.c", ValueRef::Text(br#"{"a":[1,2]}"#)).unwrap(),
      SqlValue::Json(json!({"a": [1, 2]}))
    );
    assert_eq!(decoder("text").decode("t.c", ValueRef::Null).unwrap(), SqlValue::Null);
  }

  #[test]
  fn arrays_decode_as_json() {
    let column = Column::new_array("c", "integer", "array", Some(3), false).unwrap();
    let decoded = Decoder::for_column(&column)
      .decode("t.c", ValueRef::Text(b"[1,2,3]"))
      .unwrap();
    assert_eq!(decoded, SqlValue::Json(json!([1, 2, 3])));
  }

  #[test]
  fn rejects_mismatched_cells() {
    match decoder("integer").decode("t.c", ValueRef::Text(b"x")) {
      Err(Error::Decode { column, .. }) => assert_eq!(column, "t.c"),
      other => panic!("expected decode error, got {other:?}"),
    }
  }
}
