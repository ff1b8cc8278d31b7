//! SQL generation for a [`Schema`].
//!
//! DDL and insert templates are built once per schema and reused; select
//! statements keep the same shape and only vary in their predicates.
//!
//! Table and column names are always double-quoted, so a property named
//! `group` or `order` is just another column. [`sanitize`](crate::schema::sanitize)
//! guarantees identifiers never contain a quote.

use std::collections::HashSet;

use orchid_core::selector::{Operator, Requirement};

use crate::{
  Result,
  column::Column,
  encode::SqlValue,
  schema::Schema,
  table::{PARENT_KEY, PRIMARY_KEY, Table},
};

// ─── DDL ─────────────────────────────────────────────────────────────────────

/// One `CREATE TABLE` per table, in dependency order.
pub fn create_tables_statement(schema: &Schema) -> Vec<String> {
  schema.tables().iter().map(create_table).collect()
}

fn create_table(table: &Table) -> String {
  let mut defs: Vec<String> = table
    .columns()
    .iter()
    .map(|column| {
      if table.is_primary_key(column.name()) {
        format!("{} integer primary key autoincrement", quoted(column.name()))
      } else {
        format!("{} {column}", quoted(column.name()))
      }
    })
    .collect();

  for (column, referenced) in table.foreign_keys() {
    defs.push(format!(
      "foreign key ({}) references {} ({})",
      quoted(column),
      quoted(referenced),
      quoted(PRIMARY_KEY)
    ));
  }

  format!("CREATE TABLE IF NOT EXISTS {} ({})", quoted(table.name()), defs.join(", "))
}

/// `ident` as a quoted SQL identifier.
pub fn quoted(ident: &str) -> String { format!("\"{ident}\"") }

// ─── Inserts ─────────────────────────────────────────────────────────────────

/// One insert template per table, in dependency order. Parameters are the
/// table's non-primary-key columns in column order; each returns the new key.
pub fn insert_statement(schema: &Schema) -> Vec<String> {
  schema.tables().iter().map(insert_table).collect()
}

fn insert_table(table: &Table) -> String {
  let columns: Vec<String> = table.insert_columns().map(|c| quoted(c.name())).collect();
  let params: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
    quoted(table.name()),
    columns.join(", "),
    params.join(", "),
    key_of(table)
  )
}

// ─── Selects ─────────────────────────────────────────────────────────────────

/// A column of a schema table, addressed by table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
  pub table:  String,
  pub column: String,
}

impl ColumnRef {
  pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
    Self {
      table:  table.into(),
      column: column.into(),
    }
  }
}

/// A condition appended to a select's `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
  /// `column = value`.
  Equals { column: ColumnRef, value: SqlValue },
  /// A label requirement over a `jsonb` column holding a string map.
  Label {
    column:      ColumnRef,
    requirement: Requirement,
  },
}

impl Predicate {
  pub fn equals(column: ColumnRef, value: impl Into<SqlValue>) -> Self {
    Predicate::Equals {
      column,
      value: value.into(),
    }
  }

  /// The column this predicate filters on.
  pub fn column(&self) -> &ColumnRef {
    match self {
      Predicate::Equals { column, .. } | Predicate::Label { column, .. } => column,
    }
  }

  /// Parameters this predicate binds, in placeholder order.
  pub fn params(&self) -> Vec<SqlValue> {
    match self {
      Predicate::Equals { value, .. } => vec![value.clone()],
      Predicate::Label { requirement, .. } => {
        let mut params = vec![SqlValue::Text(label_path(&requirement.key))];
        if !matches!(requirement.operator, Operator::Exists | Operator::DoesNotExist) {
          params.extend(requirement.values.iter().map(|v| SqlValue::Text(v.clone())));
        }
        params
      }
    }
  }

  /// Render against `schema`, numbering placeholders from `next`.
  fn render(&self, schema: &Schema, next: &mut usize) -> Result<String> {
    let mut param = || {
      let n = *next;
      *next += 1;
      format!("?{n}")
    };

    match self {
      Predicate::Equals { column, .. } => {
        Ok(format!("{} = {}", qualified(schema, column)?, param()))
      }
      Predicate::Label {
        column,
        requirement,
      } => {
        let extract = format!("json_extract({}, {})", qualified(schema, column)?, param());
        let values: Vec<String> = requirement.values.iter().map(|_| param()).collect();
        let values = values.join(", ");
        Ok(match requirement.operator {
          Operator::Equals | Operator::In => format!("{extract} IN ({values})"),
          Operator::NotEquals | Operator::NotIn => {
            format!("({extract} IS NULL OR {extract} NOT IN ({values}))")
          }
          Operator::Exists => format!("{extract} IS NOT NULL"),
          Operator::DoesNotExist => format!("{extract} IS NULL"),
        })
      }
    }
  }
}

/// JSON path addressing one key of a label map.
fn label_path(key: &str) -> String { format!("$.\"{key}\"") }

fn qualified(schema: &Schema, column: &ColumnRef) -> Result<String> {
  let table = schema.get_table(&column.table)?;
  if table.get_column(&column.column).is_none() {
    return Err(crate::Error::Validation(format!(
      "column {:?} not found in table {:?}",
      column.column, column.table
    )));
  }
  Ok(format!("{}.{}", table.hint(), quoted(&column.column)))
}

/// The quoted primary key of `table`, or SQLite's implicit `rowid`.
fn key_of(table: &Table) -> String {
  table.primary_key().map(quoted).unwrap_or_else(|| "rowid".to_owned())
}

/// Key a selected column is aliased to, and found under in a result set.
pub fn column_key(table: &str, column: &str) -> String { format!("{table}.{column}") }

/// Which tables a select reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
  /// Every table of the schema.
  AllTables,
  /// The first (root) table, plus whatever the predicates filter on and the
  /// ancestors joining it to the root. Enough to compose documents without
  /// multiplying rows across sibling arrays.
  Documents,
}

/// Tables read under `projection`, in schema order.
pub fn projected_tables<'a>(
  schema: &'a Schema,
  projection: Projection,
  predicates: &[Predicate],
) -> Result<Vec<&'a Table>> {
  if projection == Projection::AllTables {
    return Ok(schema.tables().iter().collect());
  }

  // The first table is the one every select starts from.
  let first = schema
    .tables()
    .first()
    .ok_or_else(|| crate::Error::Validation(format!("schema {:?} has no tables", schema.name())))?;
  let mut wanted: HashSet<&str> = HashSet::new();
  wanted.insert(first.name());
  for predicate in predicates {
    let mut table = schema.get_table(&predicate.column().table)?;
    while wanted.insert(table.name()) {
      match table.parent() {
        Some(parent) => table = schema.get_table(parent)?,
        None => break,
      }
    }
  }
  Ok(
    schema
      .tables()
      .iter()
      .filter(|t| wanted.contains(t.name()))
      .collect(),
  )
}

/// Every column of `tables`, in select order.
pub fn selected_columns<'a>(tables: &[&'a Table]) -> Vec<(&'a Table, &'a Column)> {
  tables
    .iter()
    .flat_map(|&table| table.columns().iter().map(move |c| (table, c)))
    .collect()
}

/// A select joining every table of `schema` along its foreign keys, filtered
/// by the conjunction of `predicates` and ordered by the first table's key.
///
/// Bind the parameters from [`Predicate::params`] in predicate order.
pub fn select_statement(schema: &Schema, predicates: &[Predicate]) -> Result<String> {
  let tables = projected_tables(schema, Projection::AllTables, predicates)?;
  select_tables(schema, &tables, predicates)
}

/// Like [`select_statement`], reading only the tables `projection` names.
pub fn select_projection_statement(
  schema: &Schema,
  projection: Projection,
  predicates: &[Predicate],
) -> Result<String> {
  let tables = projected_tables(schema, projection, predicates)?;
  select_tables(schema, &tables, predicates)
}

fn select_tables(schema: &Schema, tables: &[&Table], predicates: &[Predicate]) -> Result<String> {
  let columns: Vec<String> = selected_columns(tables)
    .into_iter()
    .map(|(table, column)| {
      format!(
        "{}.{} AS {}",
        table.hint(),
        quoted(column.name()),
        quoted(&column_key(table.name(), column.name()))
      )
    })
    .collect();

  let (first, rest) = tables
    .split_first()
    .ok_or_else(|| crate::Error::Validation(format!("schema {:?} has no tables", schema.name())))?;

  let mut sql = format!(
    "SELECT {} FROM {} {}",
    columns.join(", "),
    quoted(first.name()),
    first.hint()
  );

  for table in rest {
    match table.foreign_key_table(PARENT_KEY) {
      Some(parent) => {
        let parent = schema.get_table(parent)?;
        sql.push_str(&format!(
          " LEFT JOIN {} {} ON {}.{} = {}.{}",
          quoted(table.name()),
          table.hint(),
          table.hint(),
          quoted(PARENT_KEY),
          parent.hint(),
          key_of(parent),
        ));
      }
      None => sql.push_str(&format!(" CROSS JOIN {} {}", quoted(table.name()), table.hint())),
    }
  }

  if !predicates.is_empty() {
    let mut next = 1;
    let clauses = predicates
      .iter()
      .map(|p| p.render(schema, &mut next))
      .collect::<Result<Vec<_>>>()?;
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
  }

  sql.push_str(&format!(" ORDER BY {}.{}", first.hint(), key_of(first)));
  Ok(sql)
}
