//! A generated relational schema: the ordered set of tables for one type.
//!
//! SQLite has no schema namespaces, so tables are namespaced by prefix: the
//! root table is named after the schema and every other table is
//! `<schema>_<suffix>`. Tables are kept in dependency order; a table never
//! precedes a table it references.

use orchid_core::document::GroupVersionKind;

use crate::{Error, Result, table::Table};

/// Column on every root table holding the whole serialized document.
pub const EMBEDDED_RESOURCE: &str = "x_embedded_resource";

/// Suffix of the identity table every resource schema carries.
pub const METADATA: &str = "metadata";

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
  name:   String,
  tables: Vec<Table>,
}

impl Schema {
  pub fn new(name: &str) -> Self {
    Self {
      name:   sanitize(name),
      tables: Vec::new(),
    }
  }

  /// The schema for documents of `gvk`, e.g. `mock_v1_custom`. The core
  /// group is spelled `core`.
  pub fn name_for(gvk: &GroupVersionKind) -> String {
    let group = if gvk.group.is_empty() { "core" } else { &gvk.group };
    sanitize(&format!("{group}_{}_{}", gvk.version, gvk.kind))
  }

  pub fn name(&self) -> &str { &self.name }

  /// `<schema>_<suffix>`.
  pub fn table_name(&self, suffix: &str) -> String {
    format!("{}_{}", self.name, sanitize(suffix))
  }

  /// Create and append a table named `name`.
  pub fn table_factory(&mut self, name: String) -> Result<&mut Table> {
    if self.tables.iter().any(|t| t.name() == name) {
      return Err(Error::Validation(format!(
        "duplicate table {name:?} in schema {:?}",
        self.name
      )));
    }
    let hint = format!("t{}", self.tables.len());
    self.tables.push(Table::new(name, hint));
    let last = self.tables.len() - 1;
    Ok(&mut self.tables[last])
  }

  pub fn tables(&self) -> &[Table] { &self.tables }

  pub fn get_table(&self, name: &str) -> Result<&Table> {
    self
      .tables
      .iter()
      .find(|t| t.name() == name)
      .ok_or_else(|| self.missing(name))
  }

  pub(crate) fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
    let missing = self.missing(name);
    self
      .tables
      .iter_mut()
      .find(|t| t.name() == name)
      .ok_or(missing)
  }

  /// The table named after the schema.
  pub fn root(&self) -> Result<&Table> { self.get_table(&self.name) }

  pub fn metadata_table(&self) -> Result<&Table> {
    self.get_table(&self.table_name(METADATA))
  }

  /// Tables whose parent is `table`, in schema order.
  pub fn children<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Table> + 'a {
    self.tables.iter().filter(move |t| t.parent() == Some(table))
  }

  /// Whether every foreign key points at an earlier table.
  pub fn is_dependency_ordered(&self) -> bool {
    self.tables.iter().enumerate().all(|(i, table)| {
      table.foreign_keys().values().all(|referenced| {
        self.tables[..i].iter().any(|t| t.name() == referenced)
      })
    })
  }

  fn missing(&self, name: &str) -> Error {
    Error::Validation(format!("table {name:?} not found in schema {:?}", self.name))
  }
}

/// Lower-case `ident`, replacing anything outside `[a-z0-9_]` with `_`.
pub fn sanitize(ident: &str) -> String {
  ident
    .chars()
    .map(|c| {
      let c = c.to_ascii_lowercase();
      if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_tables_under_schema() {
    let mut schema = Schema::new("orchid");
    assert_eq!(schema.table_name("crd"), "orchid_crd");
    assert_eq!(schema.table_name("spec.Items"), "orchid_spec_items");

    let name = schema.table_name("crd");
    let table = schema.table_factory(name.clone()).unwrap();
    assert_eq!(table.hint(), "t0");
    assert!(schema.get_table(&name).is_ok());
    assert!(schema.table_factory(name).is_err());
    assert!(schema.get_table("orchid_other").is_err());
  }

  #[test]
  fn derives_name_from_kind() {
    let gvk = GroupVersionKind::new("stable.example.com", "v1", "CronTab");
    assert_eq!(Schema::name_for(&gvk), "stable_example_com_v1_crontab");
    let core = GroupVersionKind::new("", "v1", "ConfigMap");
    assert_eq!(Schema::name_for(&core), "core_v1_configmap");
  }

  #[test]
  fn detects_out_of_order_references() {
    let mut schema = Schema::new("s");
    schema
      .table_factory("s_child".into())
      .unwrap()
      .add_foreign_key("parent_id", "s")
      .unwrap();
    schema.table_factory("s".into()).unwrap();
    assert!(!schema.is_dependency_ordered());
  }
}
