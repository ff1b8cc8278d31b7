//! The synchronous engine: one [`Mapping`] per schema, holding the schema and
//! its prebuilt statements.
//!
//! Everything here takes a plain [`rusqlite::Connection`]; the async store
//! runs it on `tokio_rusqlite`'s connection thread.

use std::collections::HashMap;

use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::{
  Error, Result,
  decompose::{MappedMatrix, Row, RowRef},
  encode::{Decoder, SqlValue},
  result::ResultSet,
  schema::Schema,
  statement::{
    Predicate, Projection, column_key, create_tables_statement, insert_statement,
    projected_tables, select_projection_statement, selected_columns,
  },
  table::Table,
};

#[derive(Debug)]
pub struct Mapping {
  schema: Schema,
  create: Vec<String>,
  insert: Vec<String>,
}

impl Mapping {
  pub fn new(schema: Schema) -> Self {
    let create = create_tables_statement(&schema);
    let insert = insert_statement(&schema);
    Self {
      schema,
      create,
      insert,
    }
  }

  pub fn schema(&self) -> &Schema { &self.schema }

  /// Issue the schema's DDL. Idempotent.
  pub fn create_tables(&self, conn: &Connection) -> Result<()> {
    for (table, ddl) in self.schema.tables().iter().zip(&self.create) {
      debug!(table = table.name(), "creating table");
      conn
        .execute(ddl, [])
        .map_err(Error::store(table.name(), ddl))?;
    }
    Ok(())
  }

  /// Write `matrix` in one transaction; nothing is kept if any row fails.
  pub fn create(&self, conn: &mut Connection, matrix: &MappedMatrix) -> Result<()> {
    let tx = conn.transaction()?;
    self.insert_matrix(&tx, matrix)?;
    tx.commit()?;
    Ok(())
  }

  /// Insert every row of `matrix`, table by table in dependency order.
  ///
  /// Runs on whatever transaction `conn` is in; callers own commit.
  pub fn insert_matrix(&self, conn: &Connection, matrix: &MappedMatrix) -> Result<()> {
    if matrix.is_empty() {
      return Err(Error::Validation(format!(
        "no rows to write for schema {:?}",
        self.schema.name()
      )));
    }

    let mut keys = KeyCache::default();
    for (table, sql) in self.schema.tables().iter().zip(&self.insert) {
      let rows = matrix.rows(table.name());
      if rows.is_empty() {
        continue;
      }
      debug!(table = table.name(), rows = rows.len(), "inserting rows");

      let mut stmt = conn
        .prepare_cached(sql)
        .map_err(Error::store(table.name(), sql))?;
      for (index, row) in rows.iter().enumerate() {
        // A row of only foreign keys still anchors its children.
        if row.values.is_empty() && table.foreign_keys().is_empty() {
          continue;
        }
        let args = interpolate(table, row, &keys)?;
        let id: i64 = stmt
          .query_row(params_from_iter(args.iter()), |r| r.get(0))
          .map_err(Error::store(table.name(), sql))?;
        keys.insert(
          RowRef {
            table: table.name().to_owned(),
            index,
          },
          id,
        );
      }
    }
    Ok(())
  }

  /// Select across every table of the schema, filtered by `predicates`.
  pub fn query(&self, conn: &Connection, predicates: &[Predicate]) -> Result<ResultSet> {
    self.select(conn, Projection::AllTables, predicates)
  }

  /// Select only what composing documents needs: the root table and the
  /// tables `predicates` filter on.
  pub fn query_documents(&self, conn: &Connection, predicates: &[Predicate]) -> Result<ResultSet> {
    self.select(conn, Projection::Documents, predicates)
  }

  fn select(
    &self,
    conn: &Connection,
    projection: Projection,
    predicates: &[Predicate],
  ) -> Result<ResultSet> {
    let sql = select_projection_statement(&self.schema, projection, predicates)?;
    let params: Vec<SqlValue> = predicates.iter().flat_map(Predicate::params).collect();

    let tables = projected_tables(&self.schema, projection, predicates)?;
    let columns: Vec<(String, Decoder)> = selected_columns(&tables)
      .into_iter()
      .map(|(table, column)| {
        (
          column_key(table.name(), column.name()),
          Decoder::for_column(column),
        )
      })
      .collect();

    let mut result = ResultSet::new(columns.iter().map(|(key, _)| key.clone()));
    let mut stmt = conn
      .prepare_cached(&sql)
      .map_err(Error::store(self.schema.name(), &sql))?;
    let mut rows = stmt
      .query(params_from_iter(params.iter()))
      .map_err(Error::store(self.schema.name(), &sql))?;

    while let Some(row) = rows.next().map_err(Error::store(self.schema.name(), &sql))? {
      let values = columns
        .iter()
        .enumerate()
        .map(|(i, (key, decoder))| -> Result<SqlValue> {
          decoder.decode(key, row.get_ref(i)?)
        })
        .collect::<Result<Vec<_>>>()?;
      result.push(values);
    }

    debug!(schema = self.schema.name(), rows = result.len(), "queried");
    Ok(result)
  }
}

// ─── Key cache ───────────────────────────────────────────────────────────────

/// Primary keys generated so far in one write, by row and by table.
#[derive(Debug, Default)]
struct KeyCache {
  rows:   HashMap<RowRef, i64>,
  latest: HashMap<String, i64>,
}

impl KeyCache {
  fn insert(&mut self, row: RowRef, key: i64) {
    self.latest.insert(row.table.clone(), key);
    self.rows.insert(row, key);
  }

  /// The key a foreign key of `row` into `referenced` takes: its own parent
  /// row's when the row names one in that table, else the latest written.
  fn resolve(&self, row: &Row, referenced: &str) -> Option<i64> {
    match &row.parent {
      Some(parent) if parent.table == referenced => self.rows.get(parent).copied(),
      _ => self.latest.get(referenced).copied(),
    }
  }
}

/// Full insert arguments for `row`, filling foreign keys from `keys`.
fn interpolate(table: &Table, row: &Row, keys: &KeyCache) -> Result<Vec<SqlValue>> {
  let arity = table.insert_arity();
  if row.values.len() == arity {
    return Ok(row.values.clone());
  }

  let mut supplied = row.values.iter();
  let mut args = Vec::with_capacity(arity);
  for column in table.insert_columns() {
    match table.foreign_key_table(column.name()) {
      Some(referenced) => {
        let key = keys
          .resolve(row, referenced)
          .ok_or_else(|| Error::Interpolation {
            table:      table.name().to_owned(),
            column:     column.name().to_owned(),
            referenced: referenced.to_owned(),
          })?;
        args.push(SqlValue::Integer(key));
      }
      None => args.push(supplied.next().cloned().ok_or_else(|| arity_error(table, row))?),
    }
  }
  if supplied.next().is_some() {
    return Err(arity_error(table, row));
  }
  Ok(args)
}

fn arity_error(table: &Table, row: &Row) -> Error {
  Error::Validation(format!(
    "row of {} values does not fit table {:?} ({} insert columns)",
    row.values.len(),
    table.name(),
    table.insert_arity()
  ))
}
