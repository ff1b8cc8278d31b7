//! Tables of a generated schema.

use std::collections::BTreeMap;

use crate::{Error, Result, column::Column};

/// One table of a [`Schema`](crate::schema::Schema).
///
/// Besides its columns and keys, a generated table remembers which part of
/// the document it mirrors: the property `path` from the document root, the
/// parent table it hangs off, and whether it is `repeated` (one row per
/// element of an array of objects).
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
  name:         String,
  hint:         String,
  columns:      Vec<Column>,
  primary_key:  Option<String>,
  /// Column name → referenced table name.
  foreign_keys: BTreeMap<String, String>,
  path:         Vec<String>,
  parent:       Option<String>,
  repeated:     bool,
  required:     bool,
}

impl Table {
  pub(crate) fn new(name: String, hint: String) -> Self {
    Self {
      name,
      hint,
      columns: Vec::new(),
      primary_key: None,
      foreign_keys: BTreeMap::new(),
      path: Vec::new(),
      parent: None,
      repeated: false,
      required: false,
    }
  }

  /// Append `column`; names are unique within a table.
  pub fn add_column(&mut self, column: Column) -> Result<()> {
    if self.get_column(column.name()).is_some() {
      return Err(Error::Validation(format!(
        "duplicate column {:?} in table {:?}",
        column.name(),
        self.name
      )));
    }
    self.columns.push(column);
    Ok(())
  }

  /// Add the auto-incrementing integer primary key, `id`.
  pub fn add_serial_pk(&mut self) -> Result<()> {
    if let Some(pk) = &self.primary_key {
      return Err(Error::Validation(format!(
        "table {:?} already has primary key {pk:?}",
        self.name
      )));
    }
    self.add_column(Column::new(PRIMARY_KEY, "integer", "integer", false)?)?;
    self.primary_key = Some(PRIMARY_KEY.to_owned());
    Ok(())
  }

  /// Add a `not null` integer column referencing `referenced`'s primary key.
  pub fn add_foreign_key(&mut self, column: &str, referenced: &str) -> Result<()> {
    self.add_column(Column::new(column, "integer", "integer", true)?)?;
    self
      .foreign_keys
      .insert(column.to_owned(), referenced.to_owned());
    Ok(())
  }

  pub(crate) fn set_origin(
    &mut self,
    path: Vec<String>,
    parent: Option<String>,
    repeated: bool,
    required: bool,
  ) {
    self.path = path;
    self.parent = parent;
    self.repeated = repeated;
    self.required = required;
  }

  pub fn name(&self) -> &str { &self.name }

  /// Short alias used in generated SQL.
  pub fn hint(&self) -> &str { &self.hint }

  pub fn columns(&self) -> &[Column] { &self.columns }

  pub fn column_names(&self) -> Vec<&str> { self.columns.iter().map(Column::name).collect() }

  pub fn get_column(&self, name: &str) -> Option<&Column> {
    self.columns.iter().find(|c| c.name() == name)
  }

  pub fn primary_key(&self) -> Option<&str> { self.primary_key.as_deref() }

  pub fn is_primary_key(&self, column: &str) -> bool {
    self.primary_key.as_deref() == Some(column)
  }

  /// Table referenced by `column`, when it is a foreign key.
  pub fn foreign_key_table(&self, column: &str) -> Option<&str> {
    self.foreign_keys.get(column).map(String::as_str)
  }

  pub fn foreign_keys(&self) -> &BTreeMap<String, String> { &self.foreign_keys }

  /// Columns that take a value on insert: everything but the primary key.
  pub fn insert_columns(&self) -> impl Iterator<Item = &Column> {
    self.columns.iter().filter(|c| !self.is_primary_key(c.name()))
  }

  pub fn insert_arity(&self) -> usize { self.insert_columns().count() }

  /// Property path from the document root; empty for the root table.
  pub fn path(&self) -> &[String] { &self.path }

  /// Property of the parent object this table mirrors.
  pub fn field(&self) -> Option<&str> { self.path.last().map(String::as_str) }

  pub fn parent(&self) -> Option<&str> { self.parent.as_deref() }

  pub fn is_repeated(&self) -> bool { self.repeated }

  pub fn is_required(&self) -> bool { self.required }
}

/// Name of every table's primary key column.
pub const PRIMARY_KEY: &str = "id";

/// Name of the foreign key from a child table to its parent.
pub const PARENT_KEY: &str = "parent_id";
