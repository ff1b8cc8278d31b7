//! Scanned select results and their composition back into documents.

use std::collections::{HashMap, HashSet};

use orchid_core::document::Unstructured;
use serde_json::Value;

use crate::{
  Error, Result,
  encode::SqlValue,
  schema::{EMBEDDED_RESOURCE, Schema},
  statement::column_key,
  table::Table,
};

/// Rows of a select, with every cell addressed by its `"<table>.<column>"`
/// key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
  column_ids: HashMap<String, usize>,
  rows:       Vec<Vec<SqlValue>>,
}

impl ResultSet {
  pub fn new(columns: impl IntoIterator<Item = String>) -> Self {
    Self {
      column_ids: columns.into_iter().enumerate().map(|(i, c)| (c, i)).collect(),
      rows:       Vec::new(),
    }
  }

  pub fn push(&mut self, row: Vec<SqlValue>) { self.rows.push(row); }

  pub fn column_index(&self, key: &str) -> Option<usize> { self.column_ids.get(key).copied() }

  pub fn rows(&self) -> &[Vec<SqlValue>] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Cell `key` of row `row`.
  pub fn get(&self, row: usize, key: &str) -> Option<&SqlValue> {
    let index = self.column_index(key)?;
    self.rows.get(row)?.get(index)
  }

  /// Rebuild the documents of `schema` from the root's embedded column.
  ///
  /// A join yields one row per combination of child rows, so documents are
  /// deduplicated by root key, keeping first-seen order.
  pub fn compose(&self, schema: &Schema) -> Result<Vec<Unstructured>> {
    self.documents(schema.root()?, EMBEDDED_RESOURCE)
  }

  /// One document per distinct key of `table`, parsed from `column`.
  pub fn documents(&self, table: &Table, column: &str) -> Result<Vec<Unstructured>> {
    let pk = table
      .primary_key()
      .ok_or_else(|| Error::Validation(format!("table {:?} has no primary key", table.name())))?;
    let id_key = column_key(table.name(), pk);
    let doc_key = column_key(table.name(), column);
    let id_index = self.require(&id_key)?;
    let doc_index = self.require(&doc_key)?;

    let mut seen = HashSet::new();
    let mut documents = Vec::new();
    for row in &self.rows {
      let Some(id) = row.get(id_index).and_then(SqlValue::as_i64) else {
        continue;
      };
      if !seen.insert(id) {
        continue;
      }
      match row.get(doc_index) {
        Some(SqlValue::Json(Value::Object(object))) => {
          documents.push(Unstructured::new(object.clone()));
        }
        Some(SqlValue::Text(text)) => documents.push(Unstructured::from_json(text)?),
        other => {
          return Err(Error::Decode {
            column: doc_key,
            reason: format!("expected a JSON object, found {other:?}"),
          });
        }
      }
    }
    Ok(documents)
  }

  fn require(&self, key: &str) -> Result<usize> {
    self
      .column_index(key)
      .ok_or_else(|| Error::Validation(format!("result set has no column {key:?}")))
  }
}
