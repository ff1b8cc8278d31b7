//! Decomposition of a document into rows across its schema's tables.
//!
//! The walk mirrors schema generation, but over a document instance: each
//! table yields one row per object it mirrors (one per element for repeated
//! tables). Every child row records the exact parent row it came from, so
//! the write path can key it to the right parent even when a batch holds
//! several rows of the parent table.

use std::collections::HashMap;

use orchid_core::{
  document::Unstructured,
  field::{self, FieldError, Node},
};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  column::{Column, StoredType},
  encode::SqlValue,
  schema::{EMBEDDED_RESOURCE, Schema},
  table::Table,
};

// ─── Matrix ──────────────────────────────────────────────────────────────────

/// Position of a row within a [`MappedMatrix`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowRef {
  pub table: String,
  pub index: usize,
}

/// Values for one insert, aligned to the table's non-key, non-foreign-key
/// columns. The write path fills the foreign keys in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
  pub values: Vec<SqlValue>,
  pub parent: Option<RowRef>,
}

impl Row {
  pub fn new(values: Vec<SqlValue>) -> Self { Self { values, parent: None } }

  pub fn with_parent(mut self, parent: RowRef) -> Self {
    self.parent = Some(parent);
    self
  }
}

/// Rows to insert, grouped by table name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedMatrix {
  rows: HashMap<String, Vec<Row>>,
}

impl MappedMatrix {
  pub fn new() -> Self { Self::default() }

  /// Append `row` to `table`, returning where it landed.
  pub fn push(&mut self, table: &str, row: Row) -> RowRef {
    let rows = self.rows.entry(table.to_owned()).or_default();
    rows.push(row);
    RowRef {
      table: table.to_owned(),
      index: rows.len() - 1,
    }
  }

  pub fn rows(&self, table: &str) -> &[Row] {
    self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn total_rows(&self) -> usize { self.rows.values().map(Vec::len).sum() }

  pub fn is_empty(&self) -> bool { self.total_rows() == 0 }
}

// ─── Decomposition ───────────────────────────────────────────────────────────

/// Decompose `doc` against `schema`.
///
/// The root row also carries the whole document, serialized, in the
/// embedded-resource column. Fails on the first field that is required but
/// absent or present with the wrong shape; nothing is returned partially.
pub fn decompose(schema: &Schema, doc: &Unstructured) -> Result<MappedMatrix> {
  let mut matrix = MappedMatrix::new();
  let root = schema.root()?;
  let embedded = SqlValue::Text(doc.to_json()?);
  decompose_row(schema, root, &doc.object, "", None, Some(embedded), &mut matrix)?;
  Ok(matrix)
}

fn decompose_row(
  schema: &Schema,
  table: &Table,
  object: &Map<String, Value>,
  path: &str,
  parent: Option<RowRef>,
  mut embedded: Option<SqlValue>,
  matrix: &mut MappedMatrix,
) -> Result<()> {
  let mut values = Vec::with_capacity(table.insert_arity());
  for column in table.insert_columns() {
    if table.foreign_key_table(column.name()).is_some() {
      continue;
    }
    let value = match column.field() {
      Some(field) => extract(column, object, field).map_err(|e| e.under(path))?,
      None if column.name() == EMBEDDED_RESOURCE => embedded.take().unwrap_or(SqlValue::Null),
      None => SqlValue::Null,
    };
    values.push(value);
  }

  let row = Row { values, parent };
  let this = matrix.push(table.name(), row);

  for child in schema.children(table.name()) {
    decompose_child(schema, child, object, path, &this, matrix)?;
  }
  Ok(())
}

fn decompose_child(
  schema: &Schema,
  child: &Table,
  object: &Map<String, Value>,
  path: &str,
  parent: &RowRef,
  matrix: &mut MappedMatrix,
) -> Result<()> {
  let Some(field) = child.field() else {
    return Ok(());
  };
  let child_path = if path.is_empty() { field.to_owned() } else { format!("{path}.{field}") };

  let node = match field::nested(object, &[field]) {
    Ok(node) => node,
    Err(e) if e.is_not_found() && !child.is_required() => return Ok(()),
    Err(e) => return Err(e.under(path).into()),
  };

  match (node, child.is_repeated()) {
    (Node::Mapping(map), false) => {
      decompose_row(schema, child, map, &child_path, Some(parent.clone()), None, matrix)
    }
    (Node::Sequence(items), true) => {
      for (i, item) in items.iter().enumerate() {
        let item_path = format!("{child_path}[{i}]");
        let Value::Object(map) = item else {
          return Err(mismatch(item_path, "mapping", item).into());
        };
        decompose_row(schema, child, map, &item_path, Some(parent.clone()), None, matrix)?;
      }
      Ok(())
    }
    (node, repeated) => Err(Error::Extraction(FieldError::Mismatch {
      path:     child_path,
      expected: if repeated { "sequence" } else { "mapping" },
      found:    node.describe(),
    })),
  }
}

/// Extract the value `column` projects from `object[field]`.
fn extract(
  column: &Column,
  object: &Map<String, Value>,
  field: &str,
) -> Result<SqlValue, FieldError> {
  let node = match field::nested(object, &[field]) {
    Ok(node) => node,
    Err(e) if e.is_not_found() && !column.not_null() => return Ok(SqlValue::Null),
    Err(e) => return Err(e),
  };
  if matches!(node, Node::Scalar(Value::Null)) && !column.not_null() {
    return Ok(SqlValue::Null);
  }

  if column.is_array() {
    let Node::Sequence(items) = node else {
      return Err(FieldError::Mismatch {
        path:     field.to_owned(),
        expected: "sequence",
        found:    node.describe(),
      });
    };
    if let Some(max) = column.max_array_length()
      && items.len() as i64 > max
    {
      return Err(FieldError::Mismatch {
        path:     field.to_owned(),
        expected: "sequence within its maxItems bound",
        found:    "longer sequence",
      });
    }
    for (i, item) in items.iter().enumerate() {
      scalar(column.stored_type(), item, || format!("{field}[{i}]"))?;
    }
    return Ok(SqlValue::Json(Value::Array(items.to_vec())));
  }

  match node {
    Node::Scalar(value) => scalar(column.stored_type(), value, || field.to_owned()),
    Node::Sequence(items) if column.stored_type() == StoredType::Jsonb => {
      Ok(SqlValue::Json(Value::Array(items.to_vec())))
    }
    Node::Mapping(map) if column.stored_type() == StoredType::Jsonb => {
      Ok(SqlValue::Json(Value::Object(map.clone())))
    }
    other => Err(FieldError::Mismatch {
      path:     field.to_owned(),
      expected: column.stored_type().as_str(),
      found:    other.describe(),
    }),
  }
}

/// Check one scalar against `stored` and convert it.
fn scalar(
  stored: StoredType,
  value: &Value,
  path: impl FnOnce() -> String,
) -> Result<SqlValue, FieldError> {
  let converted = match stored {
    StoredType::Integer | StoredType::BigInt => value.as_i64().map(SqlValue::Integer),
    StoredType::Real | StoredType::DoublePrecision => value.as_f64().map(SqlValue::Real),
    StoredType::Text => value.as_str().map(|s| SqlValue::Text(s.to_owned())),
    StoredType::Boolean => value.as_bool().map(SqlValue::Boolean),
    StoredType::Jsonb => Some(SqlValue::Json(value.clone())),
  };
  converted.ok_or_else(|| mismatch(path(), stored.as_str(), value))
}

fn mismatch(path: String, expected: &'static str, found: &Value) -> FieldError {
  FieldError::Mismatch {
    path,
    expected,
    found: field::describe(found),
  }
}

#[cfg(test)]
mod tests {
  use orchid_core::jsonschema::JsonSchemaProps;
  use serde_json::json;

  use super::*;

  fn schema() -> Schema {
    let props = JsonSchemaProps::object([
      ("simple", JsonSchemaProps::new("integer", "int32")),
      (
        "complex",
        JsonSchemaProps::object([("simple_nested", JsonSchemaProps::new("integer", "int32"))]),
      ),
      (
        "items",
        JsonSchemaProps::array(JsonSchemaProps::object([
          ("x", JsonSchemaProps::new("number", "")),
          ("tags", JsonSchemaProps::array(JsonSchemaProps::new("string", "")).with_max_items(2)),
        ])),
      ),
    ])
    .with_required(["simple"]);
    let mut schema = Schema::generate("orchid", &props).unwrap();
    schema.add_metadata_table().unwrap();
    schema
  }

  fn doc(value: Value) -> Unstructured { Unstructured::from_value(value).unwrap() }

  #[test]
  fn one_root_row_and_child_rows() {
    let document = doc(json!({
      "metadata": {"namespace": "default", "name": "a", "labels": {"label": "label"}},
      "simple": 11,
      "complex": {"simple_nested": 2},
    }));
    let matrix = decompose(&schema(), &document).unwrap();

    let root = matrix.rows("orchid");
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].values[0], SqlValue::Text(document.to_json().unwrap()));
    assert_eq!(root[0].values[1], SqlValue::Integer(11));
    assert_eq!(root[0].parent, None);

    let complex = matrix.rows("orchid_complex");
    assert_eq!(complex.len(), 1);
    assert_eq!(complex[0].values, vec![SqlValue::Integer(2)]);
    assert_eq!(complex[0].parent, Some(RowRef { table: "orchid".into(), index: 0 }));

    let metadata = matrix.rows("orchid_metadata");
    assert_eq!(metadata[0].values, vec![
      SqlValue::Json(json!({"label": "label"})),
      SqlValue::Text("a".into()),
      SqlValue::Text("default".into()),
    ]);

    assert!(matrix.rows("orchid_items").is_empty());
    assert_eq!(matrix.total_rows(), 3);
  }

  #[test]
  fn embedded_column_round_trips() {
    let document = doc(json!({
      "metadata": {"namespace": "default", "name": "a"},
      "simple": 1,
    }));
    let matrix = decompose(&schema(), &document).unwrap();
    let SqlValue::Text(embedded) = &matrix.rows("orchid")[0].values[0] else {
      panic!("embedded column is not text");
    };
    assert_eq!(
      format!("{embedded}\n").into_bytes(),
      document.marshal_json().unwrap()
    );
  }

  #[test]
  fn repeated_rows_keep_their_element() {
    let document = doc(json!({
      "metadata": {"namespace": "default", "name": "a"},
      "simple": 1,
      "items": [{"x": 1.5, "tags": ["a"]}, {"x": 2}],
    }));
    let matrix = decompose(&schema(), &document).unwrap();
    let items = matrix.rows("orchid_items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].values, vec![SqlValue::Json(json!(["a"])), SqlValue::Real(1.5)]);
    assert_eq!(items[1].values, vec![SqlValue::Null, SqlValue::Real(2.0)]);
    assert_eq!(items[1].parent, Some(RowRef { table: "orchid".into(), index: 0 }));
  }

  #[test]
  fn missing_required_field_names_path() {
    let document = doc(json!({"metadata": {"namespace": "default", "name": "a"}}));
    match decompose(&schema(), &document) {
      Err(Error::Extraction(FieldError::NotFound { path })) => assert_eq!(path, "simple"),
      other => panic!("expected extraction error, got {other:?}"),
    }

    let document = doc(json!({"metadata": {"namespace": "default"}, "simple": 1}));
    match decompose(&schema(), &document) {
      Err(Error::Extraction(e)) => assert_eq!(e.path(), "metadata.name"),
      other => panic!("expected extraction error, got {other:?}"),
    }
  }

  #[test]
  fn wrong_shapes_are_rejected() {
    let bad_element = doc(json!({
      "metadata": {"namespace": "default", "name": "a"},
      "simple": 1,
      "items": [{"x": 1, "tags": ["a", 2]}],
    }));
    match decompose(&schema(), &bad_element) {
      Err(Error::Extraction(e)) => assert_eq!(e.path(), "items[0].tags[1]"),
      other => panic!("expected extraction error, got {other:?}"),
    }

    let too_long = doc(json!({
      "metadata": {"namespace": "default", "name": "a"},
      "simple": 1,
      "items": [{"tags": ["a", "b", "c"]}],
    }));
    assert!(matches!(decompose(&schema(), &too_long), Err(Error::Extraction(_))));

    let not_integer = doc(json!({
      "metadata": {"namespace": "default", "name": "a"},
      "simple": "11",
    }));
    match decompose(&schema(), &not_integer) {
      Err(Error::Extraction(FieldError::Mismatch { path, found, .. })) => {
        assert_eq!(path, "simple");
        assert_eq!(found, "string");
      }
      other => panic!("expected mismatch, got {other:?}"),
    }
  }
}
