//! HTTP front end for Orchid.
//!
//! Exposes an axum [`Router`] serving Kubernetes-style `/apis/...` paths
//! backed by any [`ResourceStore`]. Posting a CustomResourceDefinition
//! registers its types; every other path resolves against the registered
//! definitions.

pub mod error;
pub mod resources;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, routing::get};
use orchid_core::store::ResourceStore;
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ORCHID_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

impl ServerConfig {
  /// Layer defaults, the optional file at `path`, then the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "~/.local/share/orchid/orchid.db")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ORCHID"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for `store`.
pub fn router<S>(store: Arc<S>) -> Router<()>
where
  S: ResourceStore + 'static,
  ApiError: From<S::Error>,
{
  Router::new()
    .route(
      "/apis/{group}/{version}/{resource}",
      get(resources::list_all::<S>).post(resources::create::<S>),
    )
    .route(
      "/apis/{group}/{version}/namespaces/{namespace}/{resource}",
      get(resources::list::<S>).post(resources::create_namespaced::<S>),
    )
    .route(
      "/apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}",
      get(resources::get_one::<S>),
    )
    .with_state(store)
}
