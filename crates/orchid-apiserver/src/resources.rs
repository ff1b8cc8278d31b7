//! Handlers for `/apis/...` resource endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/apis/{group}/{version}/{resource}` | Definitions, or instances naming their namespace |
//! | `GET`  | `/apis/{group}/{version}/{resource}` | Every namespace; optional `?labelSelector=` |
//! | `POST` | `/apis/{group}/{version}/namespaces/{namespace}/{resource}` | Namespace defaults from the path |
//! | `GET`  | `/apis/{group}/{version}/namespaces/{namespace}/{resource}` | Optional `?labelSelector=` |
//! | `GET`  | `/apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}` | 404 if not found |
//!
//! `{resource}` is a type's plural or its kind, ignoring case.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use orchid_core::{
  crd,
  document::{CRD_GROUP, CRD_KIND, GroupVersionKind, NamespacedName, Unstructured},
  selector::LabelSelector,
  store::ResourceStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Plural under which definitions themselves are served.
const DEFINITIONS: &str = "customresourcedefinitions";

// ─── Resolution ───────────────────────────────────────────────────────────────

/// Map a URL resource segment onto a registered type.
async fn resolve<S>(
  store: &S,
  group: &str,
  version: &str,
  resource: &str,
) -> Result<GroupVersionKind, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  if group == CRD_GROUP
    && (resource.eq_ignore_ascii_case(DEFINITIONS) || resource.eq_ignore_ascii_case(CRD_KIND))
  {
    return Ok(GroupVersionKind::new(group, version, CRD_KIND));
  }

  store
    .definitions()
    .await?
    .iter()
    .flat_map(|definition| crd::type_definitions(definition).unwrap_or_default())
    .find(|def| def.gvk.group == group && def.gvk.version == version && def.is_named(resource))
    .map(|def| def.gvk)
    .ok_or_else(|| ApiError::NotFound(format!("no resource {resource:?} in {group}/{version}")))
}

fn parse_body(body: Value, gvk: &GroupVersionKind) -> Result<Unstructured, ApiError> {
  let doc = Unstructured::from_value(body)?;
  let found = doc.group_version_kind()?;
  if &found != gvk {
    return Err(ApiError::BadRequest(format!(
      "body is a {found}, the path serves {gvk}"
    )));
  }
  Ok(doc)
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub label_selector: Option<String>,
}

impl ListParams {
  fn selector(&self) -> Result<LabelSelector, ApiError> {
    match &self.label_selector {
      Some(s) => Ok(s.parse()?),
      None => Ok(LabelSelector::everything()),
    }
  }
}

/// `{"apiVersion", "kind": "<Kind>List", "items"}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
  pub api_version: String,
  pub kind:        String,
  pub items:       Vec<Unstructured>,
}

impl List {
  fn new(gvk: &GroupVersionKind, items: Vec<Unstructured>) -> Self {
    Self {
      api_version: gvk.api_version(),
      kind: format!("{}List", gvk.kind),
      items,
    }
  }
}

async fn list_in<S>(
  store: &S,
  namespace: Option<&str>,
  gvk: &GroupVersionKind,
  params: &ListParams,
) -> Result<Json<List>, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let selector = params.selector()?;
  let items = store.list(namespace, gvk, &selector).await?;
  Ok(Json(List::new(gvk, items)))
}

/// `GET /apis/{group}/{version}/{resource}[?labelSelector=<selector>]`
pub async fn list_all<S>(
  State(store): State<Arc<S>>,
  Path((group, version, resource)): Path<(String, String, String)>,
  Query(params): Query<ListParams>,
) -> Result<Json<List>, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let gvk = resolve(store.as_ref(), &group, &version, &resource).await?;
  list_in(store.as_ref(), None, &gvk, &params).await
}

/// `GET /apis/{group}/{version}/namespaces/{namespace}/{resource}`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path((group, version, namespace, resource)): Path<(String, String, String, String)>,
  Query(params): Query<ListParams>,
) -> Result<Json<List>, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let gvk = resolve(store.as_ref(), &group, &version, &resource).await?;
  list_in(store.as_ref(), Some(&namespace), &gvk, &params).await
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /apis/{group}/{version}/{resource}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path((group, version, resource)): Path<(String, String, String)>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let gvk = resolve(store.as_ref(), &group, &version, &resource).await?;
  let doc = parse_body(body, &gvk)?;
  store.create(doc.clone()).await?;
  Ok((StatusCode::CREATED, Json(doc)))
}

/// `POST /apis/{group}/{version}/namespaces/{namespace}/{resource}`
pub async fn create_namespaced<S>(
  State(store): State<Arc<S>>,
  Path((group, version, namespace, resource)): Path<(String, String, String, String)>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let gvk = resolve(store.as_ref(), &group, &version, &resource).await?;
  let mut doc = parse_body(body, &gvk)?;
  match doc.namespace().map(str::to_owned) {
    None => doc.set_namespace(&namespace),
    Some(ns) if ns == namespace => {}
    Some(ns) => {
      return Err(ApiError::BadRequest(format!(
        "namespace {ns:?} in body does not match {namespace:?} in path"
      )));
    }
  }
  store.create(doc.clone()).await?;
  Ok((StatusCode::CREATED, Json(doc)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((group, version, namespace, resource, name)): Path<(
    String,
    String,
    String,
    String,
    String,
  )>,
) -> Result<Json<Unstructured>, ApiError>
where
  S: ResourceStore,
  ApiError: From<S::Error>,
{
  let gvk = resolve(store.as_ref(), &group, &version, &resource).await?;
  let id = NamespacedName::new(namespace, name);
  let doc = store
    .read(&gvk, &id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", gvk.kind)))?;
  Ok(Json(doc))
}
