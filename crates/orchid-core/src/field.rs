//! Path-based access into untyped documents.
//!
//! [`Node`] is a borrowed view of a JSON value as one of three shapes:
//! scalar, sequence or mapping. The `nested_*` accessors walk a field path
//! from a mapping and return a typed value, or a [`FieldError`] that names the
//! path which was missing or had the wrong shape.
//!
//! A JSON `null` is treated the same as an absent field.

use serde_json::{Map, Value};
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
  #[error("unable to find data at {path:?}")]
  NotFound { path: String },

  #[error("field {path:?} is a {found}, expected {expected}")]
  Mismatch {
    path:     String,
    expected: &'static str,
    found:    &'static str,
  },
}

impl FieldError {
  pub fn path(&self) -> &str {
    match self {
      FieldError::NotFound { path } | FieldError::Mismatch { path, .. } => path,
    }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, FieldError::NotFound { .. }) }

  /// Re-root the error's path under `parent`.
  ///
  /// Accessors only see paths relative to the mapping they were handed, so
  /// callers walking nested objects prefix the location they started from.
  pub fn under(self, parent: &str) -> Self {
    if parent.is_empty() {
      return self;
    }
    match self {
      FieldError::NotFound { path } => FieldError::NotFound {
        path: format!("{parent}.{path}"),
      },
      FieldError::Mismatch { path, expected, found } => FieldError::Mismatch {
        path: format!("{parent}.{path}"),
        expected,
        found,
      },
    }
  }
}

// ─── Node ────────────────────────────────────────────────────────────────────

/// Borrowed, shape-tagged view of a document value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
  /// `null`, boolean, number or string.
  Scalar(&'a Value),
  Sequence(&'a [Value]),
  Mapping(&'a Map<String, Value>),
}

impl<'a> Node<'a> {
  pub fn of(value: &'a Value) -> Self {
    match value {
      Value::Array(items) => Node::Sequence(items),
      Value::Object(map) => Node::Mapping(map),
      scalar => Node::Scalar(scalar),
    }
  }

  /// Human-readable shape name used in mismatch errors.
  pub fn describe(&self) -> &'static str {
    match self {
      Node::Scalar(value) => describe(value),
      Node::Sequence(_) => "sequence",
      Node::Mapping(_) => "mapping",
    }
  }

  pub fn value(&self) -> Option<&'a Value> {
    match self {
      Node::Scalar(value) => Some(value),
      _ => None,
    }
  }
}

/// Shape name of a raw JSON value.
pub fn describe(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "sequence",
    Value::Object(_) => "mapping",
  }
}

fn join(path: &[&str]) -> String { path.join(".") }

// ─── Accessors ───────────────────────────────────────────────────────────────

/// Walk `path` from `obj` and return the node found there.
///
/// An empty path yields `obj` itself.
pub fn nested<'a>(
  obj: &'a Map<String, Value>,
  path: &[&str],
) -> Result<Node<'a>, FieldError> {
  let Some((last, parents)) = path.split_last() else {
    return Ok(Node::Mapping(obj));
  };

  let mut current = obj;
  for (depth, key) in parents.iter().enumerate() {
    match current.get(*key) {
      Some(Value::Object(map)) => current = map,
      None | Some(Value::Null) => {
        return Err(FieldError::NotFound { path: join(path) });
      }
      Some(other) => {
        return Err(FieldError::Mismatch {
          path:     join(&path[..=depth]),
          expected: "mapping",
          found:    describe(other),
        });
      }
    }
  }

  match current.get(*last) {
    None | Some(Value::Null) => Err(FieldError::NotFound { path: join(path) }),
    Some(value) => Ok(Node::of(value)),
  }
}

fn mismatch(path: &[&str], expected: &'static str, node: &Node<'_>) -> FieldError {
  FieldError::Mismatch {
    path: join(path),
    expected,
    found: node.describe(),
  }
}

pub fn nested_str<'a>(
  obj: &'a Map<String, Value>,
  path: &[&str],
) -> Result<&'a str, FieldError> {
  let node = nested(obj, path)?;
  node
    .value()
    .and_then(Value::as_str)
    .ok_or_else(|| mismatch(path, "string", &node))
}

pub fn nested_i64(
  obj: &Map<String, Value>,
  path: &[&str],
) -> Result<i64, FieldError> {
  let node = nested(obj, path)?;
  node
    .value()
    .and_then(Value::as_i64)
    .ok_or_else(|| mismatch(path, "integer", &node))
}

/// Any JSON number is accepted, integers included.
pub fn nested_f64(
  obj: &Map<String, Value>,
  path: &[&str],
) -> Result<f64, FieldError> {
  let node = nested(obj, path)?;
  node
    .value()
    .and_then(Value::as_f64)
    .ok_or_else(|| mismatch(path, "number", &node))
}

pub fn nested_bool(
  obj: &Map<String, Value>,
  path: &[&str],
) -> Result<bool, FieldError> {
  let node = nested(obj, path)?;
  node
    .value()
    .and_then(Value::as_bool)
    .ok_or_else(|| mismatch(path, "boolean", &node))
}

pub fn nested_slice<'a>(
  obj: &'a Map<String, Value>,
  path: &[&str],
) -> Result<&'a [Value], FieldError> {
  match nested(obj, path)? {
    Node::Sequence(items) => Ok(items),
    other => Err(mismatch(path, "sequence", &other)),
  }
}

pub fn nested_map<'a>(
  obj: &'a Map<String, Value>,
  path: &[&str],
) -> Result<&'a Map<String, Value>, FieldError> {
  match nested(obj, path)? {
    Node::Mapping(map) => Ok(map),
    other => Err(mismatch(path, "mapping", &other)),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc() -> Map<String, Value> {
    let Value::Object(map) = json!({
      "spec": {
        "simple": "11",
        "count": 3,
        "ratio": 0.5,
        "enabled": true,
        "tags": ["a", "b"],
        "nested": { "value": null }
      }
    }) else {
      unreachable!()
    };
    map
  }

  #[test]
  fn extracts_typed_scalars() {
    let d = doc();
    assert_eq!(nested_str(&d, &["spec", "simple"]).unwrap(), "11");
    assert_eq!(nested_i64(&d, &["spec", "count"]).unwrap(), 3);
    assert_eq!(nested_f64(&d, &["spec", "ratio"]).unwrap(), 0.5);
    assert_eq!(nested_f64(&d, &["spec", "count"]).unwrap(), 3.0);
    assert!(nested_bool(&d, &["spec", "enabled"]).unwrap());
    assert_eq!(nested_slice(&d, &["spec", "tags"]).unwrap().len(), 2);
    assert!(nested_map(&d, &["spec", "nested"]).is_ok());
  }

  #[test]
  fn missing_field_names_full_path() {
    let d = doc();
    let err = nested_str(&d, &["spec", "absent"]).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.path(), "spec.absent");

    let err = nested_str(&d, &["status", "phase"]).unwrap_err();
    assert_eq!(err.path(), "status.phase");
  }

  #[test]
  fn null_is_absent() {
    let d = doc();
    let err = nested_str(&d, &["spec", "nested", "value"]).unwrap_err();
    assert!(err.is_not_found());
  }

  #[test]
  fn wrong_shape_is_mismatch() {
    let d = doc();
    let err = nested_i64(&d, &["spec", "simple"]).unwrap_err();
    assert_eq!(err, FieldError::Mismatch {
      path:     "spec.simple".into(),
      expected: "integer",
      found:    "string",
    });

    let err = nested_str(&d, &["spec", "tags", "x"]).unwrap_err();
    assert_eq!(err.path(), "spec.tags");
  }

  #[test]
  fn under_prefixes_path() {
    let err = FieldError::NotFound { path: "name".into() }.under("spec.items[1]");
    assert_eq!(err.path(), "spec.items[1].name");
  }
}
