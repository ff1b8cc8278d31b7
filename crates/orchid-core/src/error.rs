//! Error types for `orchid-core`.

use thiserror::Error;

use crate::field::FieldError;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Field(#[from] FieldError),

  #[error("invalid apiVersion: {0:?}")]
  InvalidApiVersion(String),

  #[error("invalid label selector: {0:?}")]
  InvalidSelector(String),

  /// A document's top level must be a JSON object.
  #[error("document is not an object: found {0}")]
  NotAnObject(&'static str),

  #[error("not a CustomResourceDefinition: {0}")]
  NotADefinition(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
