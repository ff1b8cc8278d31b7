//! Reading the types served by a CustomResourceDefinition.
//!
//! Two layouts are understood:
//!
//! - `v1beta1`: `spec.version` plus `spec.validation.openAPIV3Schema`.
//! - `v1`: one entry per `spec.versions[*]`, each carrying
//!   `schema.openAPIV3Schema`.
//!
//! A version without a schema describes a type with no queryable columns; its
//! documents are still stored whole.

use serde_json::{Map, Value};

use crate::{
  Error, Result,
  document::{GroupVersionKind, Unstructured},
  field,
  jsonschema::JsonSchemaProps,
};

/// One type served by a CRD.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
  pub gvk:    GroupVersionKind,
  /// `spec.names.plural`, when given.
  pub plural: Option<String>,
  pub schema: JsonSchemaProps,
}

impl TypeDefinition {
  /// Whether `resource` (a URL path segment) names this type, by plural or
  /// by kind, ignoring case.
  pub fn is_named(&self, resource: &str) -> bool {
    self.gvk.kind.eq_ignore_ascii_case(resource)
      || self
        .plural
        .as_deref()
        .is_some_and(|p| p.eq_ignore_ascii_case(resource))
  }
}

pub fn is_definition(doc: &Unstructured) -> bool {
  doc
    .group_version_kind()
    .is_ok_and(|gvk| gvk.is_custom_resource_definition())
}

/// Every type `crd` serves.
pub fn type_definitions(crd: &Unstructured) -> Result<Vec<TypeDefinition>> {
  let gvk = crd.group_version_kind()?;
  if !gvk.is_custom_resource_definition() {
    return Err(Error::NotADefinition(gvk.to_string()));
  }

  let obj = &crd.object;
  let group = field::nested_str(obj, &["spec", "group"])?;
  let kind = field::nested_str(obj, &["spec", "names", "kind"])?;
  let plural = field::nested_str(obj, &["spec", "names", "plural"])
    .ok()
    .map(str::to_owned);
  let shared = optional_schema(obj, &["spec", "validation", "openAPIV3Schema"])?;

  let versions = match field::nested_slice(obj, &["spec", "versions"]) {
    Ok(versions) => versions,
    Err(e) if e.is_not_found() => {
      let version = field::nested_str(obj, &["spec", "version"])?;
      return Ok(vec![TypeDefinition {
        gvk: GroupVersionKind::new(group, version, kind),
        plural,
        schema: shared.unwrap_or_else(empty_object),
      }]);
    }
    Err(e) => return Err(e.into()),
  };

  versions
    .iter()
    .enumerate()
    .map(|(i, version)| -> Result<TypeDefinition> {
      let prefix = format!("spec.versions[{i}]");
      let Value::Object(version) = version else {
        return Err(
          field::FieldError::Mismatch {
            path:     prefix,
            expected: "mapping",
            found:    field::describe(version),
          }
          .into(),
        );
      };
      let name = field::nested_str(version, &["name"]).map_err(|e| e.under(&prefix))?;
      let schema = match optional_schema(version, &["schema", "openAPIV3Schema"]) {
        Ok(schema) => schema.or_else(|| shared.clone()),
        Err(Error::Field(e)) => return Err(e.under(&prefix).into()),
        Err(e) => return Err(e),
      };
      Ok(TypeDefinition {
        gvk: GroupVersionKind::new(group, name, kind),
        plural: plural.clone(),
        schema: schema.unwrap_or_else(empty_object),
      })
    })
    .collect()
}

fn empty_object() -> JsonSchemaProps { JsonSchemaProps::new("object", "") }

fn optional_schema(
  obj: &Map<String, Value>,
  path: &[&str],
) -> Result<Option<JsonSchemaProps>> {
  match field::nested_map(obj, path) {
    Ok(map) => Ok(Some(serde_json::from_value(Value::Object(map.clone()))?)),
    Err(e) if e.is_not_found() => Ok(None),
    Err(e) => Err(e.into()),
  }
}
