//! Error type for `orchid-store-sqlite`.

use orchid_core::{document::GroupVersionKind, field::FieldError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] orchid_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Malformed or empty input to a public operation.
  #[error("validation error: {0}")]
  Validation(String),

  /// The type description uses a kind that has no column mapping.
  #[error("cannot map field {path:?} of type {kind:?} (format {format:?})")]
  TypeMapping {
    path:   String,
    kind:   String,
    format: String,
  },

  /// A document field is missing or has the wrong shape.
  #[error("extraction error: {0}")]
  Extraction(#[from] FieldError),

  /// A foreign key was needed before its parent row was written.
  #[error("no primary key cached for {referenced:?} while writing {table}.{column}")]
  Interpolation {
    table:      String,
    column:     String,
    referenced: String,
  },

  /// The database rejected a generated statement.
  #[error("statement on table {table:?} failed: {source} ({statement})")]
  Store {
    table:     String,
    statement: String,
    #[source]
    source:    rusqlite::Error,
  },

  #[error("cannot decode column {column:?}: {reason}")]
  Decode { column: String, reason: String },

  #[error("no type registered for {0}")]
  UnregisteredKind(GroupVersionKind),

  #[error("type {0} is already registered")]
  AlreadyRegistered(GroupVersionKind),
}

impl Error {
  pub(crate) fn store(
    table: &str,
    statement: &str,
  ) -> impl FnOnce(rusqlite::Error) -> Self {
    move |source| Error::Store {
      table: table.to_owned(),
      statement: statement.to_owned(),
      source,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
