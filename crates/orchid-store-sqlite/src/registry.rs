//! The type registry: one fixed table recording every registered type and
//! the definition document it came from.

use orchid_core::document::{GroupVersionKind, Unstructured};
use rusqlite::Connection;

use crate::{
  Result,
  column::Column,
  decompose::{MappedMatrix, Row},
  encode::SqlValue,
  orm::Mapping,
  schema::Schema,
  statement::{ColumnRef, Predicate},
};

/// Schema holding the registry table.
pub const REGISTRY_SCHEMA: &str = "orchid";

/// Suffix of the registry table, `orchid_crd`.
const REGISTRY_TABLE: &str = "crd";

#[derive(Debug)]
pub(crate) struct Registry {
  mapping: Mapping,
  table:   String,
}

impl Registry {
  pub fn new() -> Result<Self> {
    let mut schema = Schema::new(REGISTRY_SCHEMA);
    let name = schema.table_name(REGISTRY_TABLE);
    let table = schema.table_factory(name.clone())?;
    table.add_serial_pk()?;
    table.add_column(Column::new("api_version", "text", "string", true)?)?;
    table.add_column(Column::new("kind", "text", "string", true)?)?;
    table.add_column(Column::new("data", "jsonb", "object", true)?)?;

    Ok(Self {
      mapping: Mapping::new(schema),
      table:   name,
    })
  }

  /// Create the registry table if it does not exist yet.
  pub fn bootstrap(&self, conn: &Connection) -> Result<()> { self.mapping.create_tables(conn) }

  /// Record that `definition` registered `gvk`.
  pub fn record(
    &self,
    conn: &Connection,
    gvk: &GroupVersionKind,
    definition: &Unstructured,
  ) -> Result<()> {
    let mut matrix = MappedMatrix::new();
    matrix.push(
      &self.table,
      Row::new(vec![
        SqlValue::Text(gvk.api_version()),
        SqlValue::Text(gvk.kind.clone()),
        SqlValue::Text(definition.to_json()?),
      ]),
    );
    self.mapping.insert_matrix(conn, &matrix)
  }

  /// The definition that registered `gvk`, if any.
  pub fn lookup(&self, conn: &Connection, gvk: &GroupVersionKind) -> Result<Option<Unstructured>> {
    let predicates = [
      Predicate::equals(ColumnRef::new(&self.table, "api_version"), gvk.api_version()),
      Predicate::equals(ColumnRef::new(&self.table, "kind"), gvk.kind.as_str()),
    ];
    Ok(self.definitions(conn, &predicates)?.pop())
  }

  /// Every registered definition, once each, in registration order.
  pub fn all(&self, conn: &Connection) -> Result<Vec<Unstructured>> {
    let mut unique: Vec<Unstructured> = Vec::new();
    for definition in self.definitions(conn, &[])? {
      if !unique.contains(&definition) {
        unique.push(definition);
      }
    }
    Ok(unique)
  }

  fn definitions(&self, conn: &Connection, predicates: &[Predicate]) -> Result<Vec<Unstructured>> {
    let table = self.mapping.schema().get_table(&self.table)?;
    self.mapping.query_documents(conn, predicates)?.documents(table, "data")
  }
}
