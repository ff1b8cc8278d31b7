//! The `ResourceStore` trait.
//!
//! Implemented by storage backends (e.g. `orchid-store-sqlite`). The API
//! server depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  document::{GroupVersionKind, NamespacedName, Unstructured},
  selector::LabelSelector,
};

/// Persistence for schema-described documents.
///
/// Writing a CustomResourceDefinition registers the types it serves; any
/// other document is stored as an instance of an already registered type.
pub trait ResourceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `object`, registering its types if it is a definition.
  fn create(
    &self,
    object: Unstructured,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a document by identity. Returns `None` if none was stored.
  fn read<'a>(
    &'a self,
    gvk: &'a GroupVersionKind,
    name: &'a NamespacedName,
  ) -> impl Future<Output = Result<Option<Unstructured>, Self::Error>> + Send + 'a;

  /// Every document of `gvk` matching `selector`, oldest first. `None` for
  /// `namespace` spans all namespaces.
  fn list<'a>(
    &'a self,
    namespace: Option<&'a str>,
    gvk: &'a GroupVersionKind,
    selector: &'a LabelSelector,
  ) -> impl Future<Output = Result<Vec<Unstructured>, Self::Error>> + Send + 'a;

  /// Every CustomResourceDefinition registered so far.
  fn definitions(
    &self,
  ) -> impl Future<Output = Result<Vec<Unstructured>, Self::Error>> + Send + '_;
}
