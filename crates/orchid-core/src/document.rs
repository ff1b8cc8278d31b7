//! Documents and their identities.
//!
//! An [`Unstructured`] is any Kubernetes-style object: a JSON mapping with
//! `apiVersion`, `kind` and `metadata`. Its type is a [`GroupVersionKind`];
//! within a type it is addressed by a [`NamespacedName`].

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, field};

/// API group of CustomResourceDefinition documents.
pub const CRD_GROUP: &str = "apiextensions.k8s.io";
pub const CRD_KIND: &str = "CustomResourceDefinition";

// ─── Identity ────────────────────────────────────────────────────────────────

/// The type of a document.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupVersionKind {
  /// Empty for the core group.
  pub group:   String,
  pub version: String,
  pub kind:    String,
}

impl GroupVersionKind {
  pub fn new(
    group: impl Into<String>,
    version: impl Into<String>,
    kind: impl Into<String>,
  ) -> Self {
    Self {
      group:   group.into(),
      version: version.into(),
      kind:    kind.into(),
    }
  }

  /// Split an `apiVersion` of the form `group/version` (or a bare `version`
  /// for the core group) and pair it with `kind`.
  pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self> {
    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
    if version.is_empty() || version.contains('/') || kind.is_empty() {
      return Err(Error::InvalidApiVersion(api_version.to_owned()));
    }
    Ok(Self::new(group, version, kind))
  }

  pub fn api_version(&self) -> String {
    if self.group.is_empty() {
      self.version.clone()
    } else {
      format!("{}/{}", self.group, self.version)
    }
  }

  pub fn is_custom_resource_definition(&self) -> bool {
    self.group == CRD_GROUP && self.kind == CRD_KIND
  }
}

impl fmt::Display for GroupVersionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}, Kind={}", self.api_version(), self.kind)
  }
}

/// Address of a document within its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
  pub namespace: String,
  pub name:      String,
}

impl NamespacedName {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      name:      name.into(),
    }
  }
}

impl fmt::Display for NamespacedName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.namespace, self.name)
  }
}

// ─── Unstructured ────────────────────────────────────────────────────────────

/// A document of any type, held as its raw JSON mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured {
  pub object: Map<String, Value>,
}

impl Unstructured {
  pub fn new(object: Map<String, Value>) -> Self { Self { object } }

  pub fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Object(object) => Ok(Self { object }),
      other => Err(Error::NotAnObject(field::describe(&other))),
    }
  }

  pub fn from_json(input: &str) -> Result<Self> {
    Self::from_value(serde_json::from_str(input)?)
  }

  pub fn api_version(&self) -> Option<&str> {
    field::nested_str(&self.object, &["apiVersion"]).ok()
  }

  pub fn kind(&self) -> Option<&str> { field::nested_str(&self.object, &["kind"]).ok() }

  pub fn group_version_kind(&self) -> Result<GroupVersionKind> {
    let api_version = field::nested_str(&self.object, &["apiVersion"])?;
    let kind = field::nested_str(&self.object, &["kind"])?;
    GroupVersionKind::from_api_version(api_version, kind)
  }

  pub fn namespace(&self) -> Option<&str> {
    field::nested_str(&self.object, &["metadata", "namespace"]).ok()
  }

  pub fn name(&self) -> Option<&str> {
    field::nested_str(&self.object, &["metadata", "name"]).ok()
  }

  /// Both `metadata.namespace` and `metadata.name` are required.
  pub fn namespaced_name(&self) -> Result<NamespacedName> {
    Ok(NamespacedName::new(
      field::nested_str(&self.object, &["metadata", "namespace"])?,
      field::nested_str(&self.object, &["metadata", "name"])?,
    ))
  }

  /// `metadata.labels`; non-string values are skipped.
  pub fn labels(&self) -> BTreeMap<String, String> {
    field::nested_map(&self.object, &["metadata", "labels"])
      .map(|labels| {
        labels
          .iter()
          .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_owned())))
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn set_namespace(&mut self, namespace: &str) {
    let metadata = self
      .object
      .entry("metadata")
      .or_insert_with(|| Value::Object(Map::new()));
    if !metadata.is_object() {
      *metadata = Value::Object(Map::new());
    }
    if let Value::Object(metadata) = metadata {
      metadata.insert("namespace".into(), Value::String(namespace.to_owned()));
    }
  }

  /// Compact JSON serialization, as stored in the embedded-resource column.
  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(&self.object)?) }

  /// Compact JSON followed by a newline, the framing used on the wire.
  pub fn marshal_json(&self) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(&self.object)?;
    bytes.push(b'\n');
    Ok(bytes)
  }
}

impl From<Map<String, Value>> for Unstructured {
  fn from(object: Map<String, Value>) -> Self { Self { object } }
}
