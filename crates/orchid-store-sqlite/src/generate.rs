//! Schema generation: a depth-first walk over a type description.
//!
//! - An object with properties becomes a table (the root reuses the schema's
//!   own table); each nested object gets a child table keyed to its parent.
//! - An array of objects becomes a repeated child table, one row per element.
//! - An array of scalars becomes one array column, bounded by `maxItems`.
//! - A scalar, or an object without properties, becomes one column.
//!
//! Generation is all-or-nothing: [`Schema::generate`] only returns a schema
//! once every field has been mapped.

use orchid_core::jsonschema::{JsonSchemaProps, JsonType};

use crate::{
  Error, Result,
  column::{Column, StoredType},
  schema::{EMBEDDED_RESOURCE, METADATA, Schema, sanitize},
  table::{PARENT_KEY, PRIMARY_KEY},
};

impl Schema {
  /// Generate the schema `name` from the type description `props`.
  pub fn generate(name: &str, props: &JsonSchemaProps) -> Result<Self> {
    let mut schema = Schema::new(name);
    let root_name = schema.name().to_owned();

    match props.json_type() {
      Ok(JsonType::Object) => {}
      Ok(other) => return Err(type_mapping(&[], other.as_str(), props.format())),
      Err(kind) => return Err(type_mapping(&[], &kind, props.format())),
    }

    let root = schema.table_factory(root_name.clone())?;
    root.add_serial_pk()?;
    root.add_column(Column::new(EMBEDDED_RESOURCE, "jsonb", "object", true)?)?;

    schema.walk_object(&root_name, props, &[])?;
    Ok(schema)
  }

  /// Append the identity table `<schema>_metadata`, a child of the root
  /// mirroring `metadata.namespace`, `metadata.name` and `metadata.labels`.
  pub fn add_metadata_table(&mut self) -> Result<()> {
    let props = JsonSchemaProps::object([
      ("namespace", JsonSchemaProps::new("string", "")),
      ("name", JsonSchemaProps::new("string", "")),
      ("labels", JsonSchemaProps::new("object", "")),
    ])
    .with_required(["namespace", "name"]);

    let root = self.name().to_owned();
    let path = vec![METADATA.to_owned()];
    let table = self.child_table(&root, &path, false, true)?;
    self.walk_object(&table, &props, &path)
  }

  fn walk_object(
    &mut self,
    table: &str,
    props: &JsonSchemaProps,
    path: &[String],
  ) -> Result<()> {
    for (property, sub) in &props.properties {
      // Identity lives in the metadata table.
      if path.is_empty() && property == METADATA {
        continue;
      }
      let mut field_path = path.to_vec();
      field_path.push(property.clone());
      self.walk_property(table, sub, &field_path, props.is_required(property))?;
    }
    Ok(())
  }

  fn walk_property(
    &mut self,
    table: &str,
    props: &JsonSchemaProps,
    path: &[String],
    required: bool,
  ) -> Result<()> {
    let property = path.last().map(String::as_str).unwrap_or_default();
    let kind = props
      .json_type()
      .map_err(|kind| type_mapping(path, &kind, props.format()))?;

    match kind {
      JsonType::Object if !props.properties.is_empty() => {
        let child = self.child_table(table, path, false, required)?;
        self.walk_object(&child, props, path)
      }
      JsonType::Array => {
        let items = props
          .items
          .as_deref()
          .ok_or_else(|| type_mapping(path, "array", props.format()))?;
        let item_kind = items
          .json_type()
          .map_err(|kind| type_mapping(path, &format!("array of {kind:?}"), items.format()))?;

        match item_kind {
          JsonType::Object if !items.properties.is_empty() => {
            let child = self.child_table(table, path, true, required)?;
            self.walk_object(&child, items, path)
          }
          JsonType::Array => Err(type_mapping(path, "array of array", items.format())),
          scalar => {
            let stored = stored_type(scalar, items.format(), path)?;
            let column = Column::new_array(
              &column_name(property),
              stored.as_str(),
              JsonType::Array.as_str(),
              props.max_items,
              required,
            )?
            .with_field(property);
            self.get_table_mut(table)?.add_column(column)
          }
        }
      }
      scalar => {
        let stored = stored_type(scalar, props.format(), path)?;
        let column =
          Column::new(&column_name(property), stored.as_str(), scalar.as_str(), required)?
            .with_field(property);
        self.get_table_mut(table)?.add_column(column)
      }
    }
  }

  /// Create the table mirroring the object at `path`, keyed to `parent`.
  fn child_table(
    &mut self,
    parent: &str,
    path: &[String],
    repeated: bool,
    required: bool,
  ) -> Result<String> {
    let name = self.table_name(&path.join("_"));
    let child = self.table_factory(name.clone())?;
    child.add_serial_pk()?;
    child.add_foreign_key(PARENT_KEY, parent)?;
    child.set_origin(path.to_vec(), Some(parent.to_owned()), repeated, required);
    Ok(name)
  }
}

/// Column for `property`: sanitised, and prefixed with `x_` when that would
/// shadow a key column or start with a digit.
fn column_name(property: &str) -> String {
  let name = sanitize(property);
  let reserved = [PRIMARY_KEY, PARENT_KEY, EMBEDDED_RESOURCE].contains(&name.as_str());
  if reserved || name.starts_with(|c: char| c.is_ascii_digit()) {
    format!("x_{name}")
  } else {
    name
  }
}

fn stored_type(kind: JsonType, format: &str, path: &[String]) -> Result<StoredType> {
  StoredType::for_kind(kind, format).ok_or_else(|| type_mapping(path, kind.as_str(), format))
}

fn type_mapping(path: &[String], kind: &str, format: &str) -> Error {
  Error::TypeMapping {
    path:   path.join("."),
    kind:   kind.to_owned(),
    format: format.to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn complex() -> JsonSchemaProps {
    JsonSchemaProps::object([
      ("simple", JsonSchemaProps::new("integer", "int32")),
      (
        "complex",
        JsonSchemaProps::object([
          ("simple_nested", JsonSchemaProps::new("integer", "int32")),
          (
            "complex_nested",
            JsonSchemaProps::object([("attribute", JsonSchemaProps::new("string", "byte"))]),
          ),
        ]),
      ),
    ])
  }

  #[test]
  fn generates_table_per_object_level() {
    let schema = Schema::generate("orchid", &complex()).unwrap();

    let names: Vec<&str> = schema.tables().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec![
      "orchid",
      "orchid_complex",
      "orchid_complex_complex_nested",
    ]);

    let root = schema.root().unwrap();
    assert_eq!(root.column_names(), vec![PRIMARY_KEY, EMBEDDED_RESOURCE, "simple"]);
    assert!(root.foreign_keys().is_empty());

    let complex = schema.get_table("orchid_complex").unwrap();
    assert_eq!(complex.foreign_key_table(PARENT_KEY), Some("orchid"));
    assert_eq!(complex.parent(), Some("orchid"));
    assert!(complex.get_column("simple_nested").is_some());

    let nested = schema.get_table("orchid_complex_complex_nested").unwrap();
    assert_eq!(nested.foreign_key_table(PARENT_KEY), Some("orchid_complex"));
    assert_eq!(nested.path(), ["complex", "complex_nested"]);
    assert_eq!(nested.get_column("attribute").unwrap().to_string(), "text");

    assert!(schema.is_dependency_ordered());
  }

  #[test]
  fn maps_arrays_and_free_form_objects() {
    let props = JsonSchemaProps::object([
      ("ports", JsonSchemaProps::array(JsonSchemaProps::new("integer", "int32")).with_max_items(4)),
      ("names", JsonSchemaProps::array(JsonSchemaProps::new("string", ""))),
      ("annotations", JsonSchemaProps::new("object", "")),
      (
        "containers",
        JsonSchemaProps::array(JsonSchemaProps::object([(
          "image",
          JsonSchemaProps::new("string", ""),
        )])),
      ),
    ])
    .with_required(["names"]);

    let schema = Schema::generate("pod", &props).unwrap();
    let root = schema.root().unwrap();
    assert_eq!(root.get_column("ports").unwrap().to_string(), "integer[4]");
    assert_eq!(root.get_column("names").unwrap().to_string(), "text[] not null");
    assert_eq!(root.get_column("annotations").unwrap().to_string(), "jsonb");

    let containers = schema.get_table("pod_containers").unwrap();
    assert!(containers.is_repeated());
    assert!(containers.get_column("image").is_some());
  }

  #[test]
  fn root_metadata_is_reserved() {
    let props = JsonSchemaProps::object([
      ("metadata", JsonSchemaProps::object([("x", JsonSchemaProps::new("string", ""))])),
      ("kind", JsonSchemaProps::new("string", "")),
    ]);
    let mut schema = Schema::generate("custom", &props).unwrap();
    assert_eq!(schema.tables().len(), 1);

    schema.add_metadata_table().unwrap();
    let metadata = schema.metadata_table().unwrap();
    assert_eq!(metadata.name(), "custom_metadata");
    assert_eq!(metadata.foreign_key_table(PARENT_KEY), Some("custom"));
    assert!(metadata.get_column("namespace").unwrap().not_null());
    assert!(metadata.get_column("name").unwrap().not_null());
    assert_eq!(metadata.get_column("labels").unwrap().to_string(), "jsonb");
    assert!(schema.is_dependency_ordered());
  }

  #[test]
  fn unknown_kind_aborts_with_path() {
    let props = JsonSchemaProps::object([(
      "complex",
      JsonSchemaProps::object([("bad", JsonSchemaProps::new("uuid", ""))]),
    )]);
    match Schema::generate("orchid", &props) {
      Err(Error::TypeMapping { path, kind, .. }) => {
        assert_eq!(path, "complex.bad");
        assert_eq!(kind, "uuid");
      }
      other => panic!("expected type mapping error, got {other:?}"),
    }
  }

  #[test]
  fn nested_arrays_are_rejected() {
    let props = JsonSchemaProps::object([(
      "matrix",
      JsonSchemaProps::array(JsonSchemaProps::array(JsonSchemaProps::new("integer", ""))),
    )]);
    assert!(matches!(
      Schema::generate("m", &props),
      Err(Error::TypeMapping { .. })
    ));

    let untyped = JsonSchemaProps::object([("list", JsonSchemaProps::new("array", ""))]);
    assert!(matches!(
      Schema::generate("m", &untyped),
      Err(Error::TypeMapping { .. })
    ));
  }

  #[test]
  fn reserved_property_names_are_prefixed() {
    let props = JsonSchemaProps::object([
      ("id", JsonSchemaProps::new("string", "")),
      ("parent_id", JsonSchemaProps::new("integer", "")),
      ("2fa", JsonSchemaProps::new("boolean", "")),
      (
        "child",
        JsonSchemaProps::object([("id", JsonSchemaProps::new("string", ""))]),
      ),
    ]);
    let schema = Schema::generate("orchid", &props).unwrap();

    let root = schema.root().unwrap();
    assert_eq!(root.column_names(), vec![
      PRIMARY_KEY,
      EMBEDDED_RESOURCE,
      "x_2fa",
      "x_id",
      "x_parent_id",
    ]);
    assert_eq!(root.get_column("x_id").unwrap().field(), Some("id"));
    assert_eq!(root.get_column("x_2fa").unwrap().field(), Some("2fa"));

    let child = schema.get_table("orchid_child").unwrap();
    assert_eq!(child.column_names(), vec![PRIMARY_KEY, PARENT_KEY, "x_id"]);
  }

  #[test]
  fn colliding_names_are_validation_errors() {
    let props = JsonSchemaProps::object([
      ("a-b", JsonSchemaProps::new("string", "")),
      ("a_b", JsonSchemaProps::new("string", "")),
    ]);
    assert!(matches!(Schema::generate("c", &props), Err(Error::Validation(_))));
  }
}
