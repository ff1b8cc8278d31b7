//! [`SqliteStore`], the SQLite implementation of [`ResourceStore`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
  sync::Arc,
};

use rusqlite::Connection;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use orchid_core::{
  crd,
  document::{GroupVersionKind, NamespacedName, Unstructured},
  selector::LabelSelector,
  store::ResourceStore,
};

use crate::{
  Error, Result,
  decompose::decompose,
  orm::Mapping,
  registry::Registry,
  schema::{METADATA, Schema},
  statement::{ColumnRef, Predicate},
};

const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite database.
///
/// Clones share the connection and the schema cache.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  inner: Arc<Inner>,
}

struct Inner {
  registry: Registry,
  /// Schemas already resolved, with their prebuilt statements.
  mappings: RwLock<HashMap<GroupVersionKind, Arc<Mapping>>>,
  /// Serialises schema creation per type.
  locks:    Mutex<HashMap<GroupVersionKind, Arc<Mutex<()>>>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bootstrap the registry.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn).await
  }

  /// Wrap an open connection. Stores built from clones of one connection
  /// share the database but not their schema caches.
  pub async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
      })
      .await?;

    let store = Self {
      conn,
      inner: Arc::new(Inner {
        registry: Registry::new()?,
        mappings: RwLock::new(HashMap::new()),
        locks:    Mutex::new(HashMap::new()),
      }),
    };
    store.bootstrap().await?;
    Ok(store)
  }

  pub fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Ensure the registry table exists. Idempotent.
  pub async fn bootstrap(&self) -> Result<()> {
    let inner = self.inner.clone();
    self
      .conn
      .call(move |conn| Ok(inner.registry.bootstrap(conn)))
      .await??;
    Ok(())
  }

  /// Register every type `definition` serves, in one transaction: either all
  /// of its tables and registry rows are written or none are.
  pub async fn register(&self, definition: Unstructured) -> Result<Vec<GroupVersionKind>> {
    let mut prepared: Vec<(GroupVersionKind, Arc<Mapping>)> = Vec::new();
    for def in crd::type_definitions(&definition)? {
      let mut schema = Schema::generate(&Schema::name_for(&def.gvk), &def.schema)?;
      schema.add_metadata_table()?;
      prepared.push((def.gvk, Arc::new(Mapping::new(schema))));
    }
    prepared.sort_by(|a, b| a.0.cmp(&b.0));

    // Lock in sorted order so overlapping registrations cannot deadlock.
    let mut locks = Vec::with_capacity(prepared.len());
    for (gvk, _) in &prepared {
      locks.push(self.lock_for(gvk).await);
    }
    let mut guards = Vec::with_capacity(locks.len());
    for lock in &locks {
      guards.push(lock.lock().await);
    }

    let inner = self.inner.clone();
    let batch = prepared.clone();
    self
      .conn
      .call(move |conn| Ok(register_batch(&inner.registry, conn, &batch, &definition)))
      .await??;

    let mut mappings = self.inner.mappings.write().await;
    let registered = prepared
      .into_iter()
      .map(|(gvk, mapping)| {
        info!(kind = %gvk, tables = mapping.schema().tables().len(), "registered type");
        mappings.insert(gvk.clone(), mapping);
        gvk
      })
      .collect();
    Ok(registered)
  }

  /// The mapping for `gvk`: cached, or re-derived from the registry and its
  /// tables ensured. Fails with [`Error::UnregisteredKind`] for unknown types.
  pub async fn mapping(&self, gvk: &GroupVersionKind) -> Result<Arc<Mapping>> {
    if let Some(mapping) = self.cached(gvk).await {
      return Ok(mapping);
    }

    let lock = self.lock_for(gvk).await;
    let _guard = lock.lock().await;
    if let Some(mapping) = self.cached(gvk).await {
      return Ok(mapping);
    }

    let inner = self.inner.clone();
    let key = gvk.clone();
    let mapping = self
      .conn
      .call(move |conn| Ok(load_mapping(&inner.registry, conn, &key)))
      .await??;

    debug!(kind = %gvk, "loaded type from registry");
    self
      .inner
      .mappings
      .write()
      .await
      .insert(gvk.clone(), mapping.clone());
    Ok(mapping)
  }

  async fn cached(&self, gvk: &GroupVersionKind) -> Option<Arc<Mapping>> {
    self.inner.mappings.read().await.get(gvk).cloned()
  }

  async fn lock_for(&self, gvk: &GroupVersionKind) -> Arc<Mutex<()>> {
    self
      .inner
      .locks
      .lock()
      .await
      .entry(gvk.clone())
      .or_default()
      .clone()
  }

  async fn query(
    &self,
    mapping: Arc<Mapping>,
    predicates: Vec<Predicate>,
  ) -> Result<Vec<Unstructured>> {
    self
      .conn
      .call(move |conn| {
        Ok(
          mapping
            .query_documents(conn, &predicates)
            .and_then(|rows| rows.compose(mapping.schema())),
        )
      })
      .await?
  }
}

fn register_batch(
  registry: &Registry,
  conn: &mut Connection,
  batch: &[(GroupVersionKind, Arc<Mapping>)],
  definition: &Unstructured,
) -> Result<()> {
  let tx = conn.transaction()?;
  let mut claimed = HashSet::new();
  for (gvk, mapping) in batch {
    if registry.lookup(&tx, gvk)?.is_some() {
      return Err(Error::AlreadyRegistered(gvk.clone()));
    }
    // Distinct types can sanitise to the same table names.
    for table in mapping.schema().tables() {
      if !claimed.insert(table.name()) || table_exists(&tx, table.name())? {
        return Err(Error::Validation(format!(
          "table {:?} for {gvk} is already in use",
          table.name()
        )));
      }
    }
  }
  for (gvk, mapping) in batch {
    mapping.create_tables(&tx)?;
    registry.record(&tx, gvk, definition)?;
  }
  tx.commit()?;
  Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
  let found: i64 = conn.query_row(
    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
    [name],
    |r| r.get(0),
  )?;
  Ok(found > 0)
}

fn load_mapping(
  registry: &Registry,
  conn: &Connection,
  gvk: &GroupVersionKind,
) -> Result<Arc<Mapping>> {
  let unregistered = || Error::UnregisteredKind(gvk.clone());
  let definition = registry.lookup(conn, gvk)?.ok_or_else(unregistered)?;
  let def = crd::type_definitions(&definition)?
    .into_iter()
    .find(|def| &def.gvk == gvk)
    .ok_or_else(unregistered)?;

  let mut schema = Schema::generate(&Schema::name_for(gvk), &def.schema)?;
  schema.add_metadata_table()?;
  let mapping = Mapping::new(schema);
  mapping.create_tables(conn)?;
  Ok(Arc::new(mapping))
}

fn identity_predicates(schema: &Schema, name: &NamespacedName) -> Vec<Predicate> {
  let metadata = schema.table_name(METADATA);
  vec![
    Predicate::equals(ColumnRef::new(&metadata, "namespace"), name.namespace.as_str()),
    Predicate::equals(ColumnRef::new(metadata, "name"), name.name.as_str()),
  ]
}

fn selector_predicates(
  schema: &Schema,
  namespace: Option<&str>,
  selector: &LabelSelector,
) -> Vec<Predicate> {
  let metadata = schema.table_name(METADATA);
  let mut predicates: Vec<Predicate> = namespace
    .map(|ns| Predicate::equals(ColumnRef::new(&metadata, "namespace"), ns))
    .into_iter()
    .collect();
  predicates.extend(selector.requirements.iter().map(|requirement| {
    Predicate::Label {
      column:      ColumnRef::new(&metadata, "labels"),
      requirement: requirement.clone(),
    }
  }));
  predicates
}

// ─── ResourceStore impl ──────────────────────────────────────────────────────

impl ResourceStore for SqliteStore {
  type Error = Error;

  async fn create(&self, object: Unstructured) -> Result<()> {
    if crd::is_definition(&object) {
      self.register(object).await?;
      return Ok(());
    }

    let gvk = object.group_version_kind()?;
    let mapping = self.mapping(&gvk).await?;
    let matrix = decompose(mapping.schema(), &object)?;
    info!(
      kind = %gvk,
      name = object.name().unwrap_or_default(),
      rows = matrix.total_rows(),
      "creating resource"
    );

    self
      .conn
      .call(move |conn| Ok(mapping.create(conn, &matrix)))
      .await??;
    Ok(())
  }

  async fn read(
    &self,
    gvk: &GroupVersionKind,
    name: &NamespacedName,
  ) -> Result<Option<Unstructured>> {
    // Definitions are cluster-scoped and live in the registry.
    if gvk.is_custom_resource_definition() {
      let definitions = self.definitions().await?;
      return Ok(
        definitions
          .into_iter()
          .rfind(|d| d.name() == Some(name.name.as_str())),
      );
    }

    let mapping = self.mapping(gvk).await?;
    let predicates = identity_predicates(mapping.schema(), name);
    Ok(self.query(mapping, predicates).await?.pop())
  }

  async fn list(
    &self,
    namespace: Option<&str>,
    gvk: &GroupVersionKind,
    selector: &LabelSelector,
  ) -> Result<Vec<Unstructured>> {
    if gvk.is_custom_resource_definition() {
      let definitions = self.definitions().await?;
      return Ok(
        definitions
          .into_iter()
          .filter(|d| selector.matches(&d.labels()))
          .collect(),
      );
    }

    let mapping = self.mapping(gvk).await?;
    let predicates = selector_predicates(mapping.schema(), namespace, selector);
    self.query(mapping, predicates).await
  }

  async fn definitions(&self) -> Result<Vec<Unstructured>> {
    let inner = self.inner.clone();
    self
      .conn
      .call(move |conn| Ok(inner.registry.all(conn)))
      .await?
  }
}
