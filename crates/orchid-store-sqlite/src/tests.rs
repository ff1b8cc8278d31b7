//! Integration tests for `SqliteStore` against an in-memory database.

use orchid_core::{
  document::{GroupVersionKind, NamespacedName, Unstructured},
  selector::LabelSelector,
  store::ResourceStore,
};
use serde_json::{Value, json};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn custom() -> GroupVersionKind { GroupVersionKind::new("mock", "v1", "Custom") }

fn definition() -> Unstructured {
  Unstructured::from_value(json!({
    "apiVersion": "apiextensions.k8s.io/v1beta1",
    "kind": "CustomResourceDefinition",
    "metadata": {"name": "customs.mock"},
    "spec": {
      "group": "mock",
      "version": "v1",
      "names": {"kind": "Custom", "plural": "customs"},
      "validation": {
        "openAPIV3Schema": {
          "type": "object",
          "properties": {
            "spec": {
              "type": "object",
              "properties": {
                "simple": {"type": "integer", "format": "int32"},
                "complex": {
                  "type": "object",
                  "properties": {
                    "simple_nested": {"type": "integer", "format": "int32"},
                    "complex_nested": {
                      "type": "object",
                      "properties": {"attribute": {"type": "string", "format": "byte"}}
                    }
                  }
                },
                "ports": {
                  "type": "array",
                  "maxItems": 4,
                  "items": {"type": "integer"}
                },
                "containers": {
                  "type": "array",
                  "items": {
                    "type": "object",
                    "properties": {"image": {"type": "string"}}
                  }
                }
              }
            }
          }
        }
      }
    }
  }))
  .unwrap()
}

fn instance(namespace: &str, name: &str, labels: Value) -> Unstructured {
  Unstructured::from_value(json!({
    "apiVersion": "mock/v1",
    "kind": "Custom",
    "metadata": {"namespace": namespace, "name": name, "labels": labels},
    "spec": {
      "simple": 11,
      "complex": {"simple_nested": 2, "complex_nested": {"attribute": "YWJj"}},
      "ports": [80, 443],
      "containers": [{"image": "nginx"}, {"image": "envoy"}]
    }
  }))
  .unwrap()
}

async fn registered() -> SqliteStore {
  let s = store().await;
  s.create(definition()).await.unwrap();
  s
}

fn names(docs: &[Unstructured]) -> Vec<&str> {
  docs.iter().filter_map(Unstructured::name).collect()
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_is_idempotent() {
  let s = store().await;
  s.bootstrap().await.unwrap();
  s.bootstrap().await.unwrap();
  assert!(s.definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn registering_definition_creates_tables() {
  let s = store().await;
  let registered = s.register(definition()).await.unwrap();
  assert_eq!(registered, vec![custom()]);

  let tables: Vec<String> = s
    .connection()
    .call(|conn| {
      let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'mock_v1_custom%' \
         ORDER BY name",
      )?;
      let names = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
      Ok(names)
    })
    .await
    .unwrap();
  assert_eq!(tables, vec![
    "mock_v1_custom",
    "mock_v1_custom_metadata",
    "mock_v1_custom_spec",
    "mock_v1_custom_spec_complex",
    "mock_v1_custom_spec_complex_complex_nested",
    "mock_v1_custom_spec_containers",
  ]);

  assert_eq!(s.definitions().await.unwrap(), vec![definition()]);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
  let s = registered().await;
  match s.create(definition()).await {
    Err(Error::AlreadyRegistered(gvk)) => assert_eq!(gvk, custom()),
    other => panic!("expected already registered, got {other:?}"),
  }
  assert_eq!(s.definitions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_generation_registers_nothing() {
  let s = store().await;
  let mut bad = definition();
  let spec = &mut bad.object["spec"]["validation"]["openAPIV3Schema"]["properties"]["spec"];
  spec["properties"]["when"] = json!({"type": "date"});
  assert!(matches!(s.create(bad).await, Err(Error::TypeMapping { .. })));
  assert!(s.definitions().await.unwrap().is_empty());
  assert!(matches!(
    s.mapping(&custom()).await,
    Err(Error::UnregisteredKind(_))
  ));
}

fn simple_definition(group: &str, kind: &str, properties: Value) -> Unstructured {
  Unstructured::from_value(json!({
    "apiVersion": "apiextensions.k8s.io/v1beta1",
    "kind": "CustomResourceDefinition",
    "metadata": {"name": format!("{}.{group}", kind.to_lowercase())},
    "spec": {
      "group": group,
      "version": "v1",
      "names": {"kind": kind},
      "validation": {
        "openAPIV3Schema": {"type": "object", "properties": properties}
      }
    }
  }))
  .unwrap()
}

#[tokio::test]
async fn colliding_table_names_are_rejected() {
  let s = store().await;
  s.create(simple_definition(
    "mock",
    "Foo",
    json!({"spec": {"type": "object", "properties": {"a": {"type": "string"}}}}),
  ))
  .await
  .unwrap();

  // `Foo_spec` would land on `Foo`'s `spec` child table.
  let clash = simple_definition("mock", "Foo_spec", json!({"b": {"type": "string"}}));
  assert!(matches!(s.create(clash).await, Err(Error::Validation(_))));
  assert_eq!(s.definitions().await.unwrap().len(), 1);

  // `a.b` and `a_b` sanitise to the same prefix.
  s.create(simple_definition("a.b", "Bar", json!({"x": {"type": "string"}})))
    .await
    .unwrap();
  let clash = simple_definition("a_b", "Bar", json!({"x": {"type": "string"}}));
  assert!(matches!(s.create(clash).await, Err(Error::Validation(_))));
  assert_eq!(s.definitions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn keyword_and_reserved_properties_round_trip() {
  let s = store().await;
  s.create(simple_definition(
    "mock",
    "Ordered",
    json!({"spec": {"type": "object", "properties": {
      "id": {"type": "string"},
      "order": {"type": "integer"},
      "group": {"type": "string"},
      "default": {"type": "object", "properties": {"check": {"type": "boolean"}}}
    }}}),
  ))
  .await
  .unwrap();

  let doc = Unstructured::from_value(json!({
    "apiVersion": "mock/v1",
    "kind": "Ordered",
    "metadata": {"namespace": "default", "name": "o"},
    "spec": {"id": "o-1", "order": 1, "group": "g", "default": {"check": true}}
  }))
  .unwrap();
  s.create(doc.clone()).await.unwrap();

  let gvk = GroupVersionKind::new("mock", "v1", "Ordered");
  let read = s.read(&gvk, &NamespacedName::new("default", "o")).await.unwrap();
  assert_eq!(read, Some(doc));
}

#[tokio::test]
async fn container_only_objects_round_trip() {
  let s = store().await;
  s.create(simple_definition(
    "mock",
    "Wrap",
    json!({"spec": {"type": "object", "properties": {
      "template": {"type": "object", "properties": {"image": {"type": "string"}}}
    }}}),
  ))
  .await
  .unwrap();

  let doc = Unstructured::from_value(json!({
    "apiVersion": "mock/v1",
    "kind": "Wrap",
    "metadata": {"namespace": "default", "name": "w"},
    "spec": {"template": {"image": "nginx"}}
  }))
  .unwrap();
  s.create(doc.clone()).await.unwrap();

  let gvk = GroupVersionKind::new("mock", "v1", "Wrap");
  let listed = s.list(None, &gvk, &LabelSelector::everything()).await.unwrap();
  assert_eq!(listed, vec![doc]);
}

#[tokio::test]
async fn registers_every_served_version() {
  let s = store().await;
  let crd = Unstructured::from_value(json!({
    "apiVersion": "apiextensions.k8s.io/v1",
    "kind": "CustomResourceDefinition",
    "metadata": {"name": "widgets.example.com"},
    "spec": {
      "group": "example.com",
      "names": {"kind": "Widget", "plural": "widgets"},
      "versions": [
        {"name": "v1", "schema": {"openAPIV3Schema": {"type": "object"}}},
        {"name": "v2", "schema": {"openAPIV3Schema": {
          "type": "object",
          "properties": {"size": {"type": "number"}}
        }}}
      ]
    }
  }))
  .unwrap();
  s.create(crd.clone()).await.unwrap();

  for version in ["v1", "v2"] {
    let gvk = GroupVersionKind::new("example.com", version, "Widget");
    let doc = Unstructured::from_value(json!({
      "apiVersion": gvk.api_version(),
      "kind": "Widget",
      "metadata": {"namespace": "default", "name": "w"},
      "size": 1.5
    }))
    .unwrap();
    s.create(doc.clone()).await.unwrap();
    let read = s.read(&gvk, &NamespacedName::new("default", "w")).await.unwrap();
    assert_eq!(read, Some(doc));
  }
  assert_eq!(s.definitions().await.unwrap(), vec![crd]);
}

// ─── Instances ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn round_trip_is_byte_identical() {
  let s = registered().await;
  let doc = instance("default", "a", json!({"label": "label"}));
  s.create(doc.clone()).await.unwrap();

  let read = s
    .read(&custom(), &NamespacedName::new("default", "a"))
    .await
    .unwrap()
    .expect("stored document");
  assert_eq!(read.marshal_json().unwrap(), doc.marshal_json().unwrap());
}

#[tokio::test]
async fn read_missing_returns_none() {
  let s = registered().await;
  let result = s
    .read(&custom(), &NamespacedName::new("default", "missing"))
    .await
    .unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn read_returns_latest_duplicate() {
  let s = registered().await;
  s.create(instance("default", "a", json!({"v": "1"}))).await.unwrap();
  let latest = instance("default", "a", json!({"v": "2"}));
  s.create(latest.clone()).await.unwrap();

  let read = s
    .read(&custom(), &NamespacedName::new("default", "a"))
    .await
    .unwrap();
  assert_eq!(read, Some(latest));
}

#[tokio::test]
async fn list_matches_selector() {
  let s = registered().await;
  s.create(instance("default", "a", json!({"label": "label"}))).await.unwrap();
  s.create(instance("default", "b", json!({"label": "label"}))).await.unwrap();

  let selector: LabelSelector = "label=label".parse().unwrap();
  let listed = s.list(Some("default"), &custom(), &selector).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(names(&listed), vec!["a", "b"]);
}

#[tokio::test]
async fn list_filters_by_namespace_and_labels() {
  let s = registered().await;
  s.create(instance("default", "a", json!({"tier": "web", "env": "prod"})))
    .await
    .unwrap();
  s.create(instance("default", "b", json!({"tier": "db"}))).await.unwrap();
  s.create(instance("other", "c", json!({"tier": "web"}))).await.unwrap();

  let list = |ns: Option<&'static str>, selector: &'static str| {
    let s = s.clone();
    async move {
      let selector: LabelSelector = selector.parse().unwrap();
      s.list(ns, &custom(), &selector).await.unwrap()
    }
  };

  assert_eq!(names(&list(None, "").await), vec!["a", "b", "c"]);
  assert_eq!(names(&list(Some("default"), "").await), vec!["a", "b"]);
  assert_eq!(names(&list(None, "tier=web").await), vec!["a", "c"]);
  assert_eq!(names(&list(None, "tier!=web").await), vec!["b"]);
  assert_eq!(names(&list(None, "tier in (db,cache)").await), vec!["b"]);
  assert_eq!(names(&list(None, "tier notin (db)").await), vec!["a", "c"]);
  assert_eq!(names(&list(None, "env").await), vec!["a"]);
  assert_eq!(names(&list(None, "!env").await), vec!["b", "c"]);
  assert_eq!(names(&list(Some("default"), "tier=web,env=prod").await), vec!["a"]);
  assert!(list(Some("missing"), "").await.is_empty());
}

#[tokio::test]
async fn unregistered_kind_is_an_error() {
  let s = store().await;
  match s.create(instance("default", "a", json!({}))).await {
    Err(Error::UnregisteredKind(gvk)) => assert_eq!(gvk, custom()),
    other => panic!("expected unregistered kind, got {other:?}"),
  }
  assert!(matches!(
    s.list(None, &custom(), &LabelSelector::everything()).await,
    Err(Error::UnregisteredKind(_))
  ));
}

#[tokio::test]
async fn invalid_instance_writes_nothing() {
  let s = registered().await;
  let mut bad = instance("default", "a", json!({}));
  bad.object["spec"]["ports"] = json!([80, "http"]);
  match s.create(bad).await {
    Err(Error::Extraction(e)) => assert_eq!(e.path(), "spec.ports[1]"),
    other => panic!("expected extraction error, got {other:?}"),
  }

  let mut anonymous = instance("default", "a", json!({}));
  anonymous.object["metadata"] = json!({"namespace": "default"});
  assert!(matches!(s.create(anonymous).await, Err(Error::Extraction(_))));

  let listed = s
    .list(None, &custom(), &LabelSelector::everything())
    .await
    .unwrap();
  assert!(listed.is_empty());
}

#[tokio::test]
async fn definitions_are_readable_as_documents() {
  let s = registered().await;
  let crd_gvk = GroupVersionKind::new("apiextensions.k8s.io", "v1beta1", "CustomResourceDefinition");
  let read = s
    .read(&crd_gvk, &NamespacedName::new("", "customs.mock"))
    .await
    .unwrap();
  assert_eq!(read, Some(definition()));
  let listed = s
    .list(None, &crd_gvk, &LabelSelector::everything())
    .await
    .unwrap();
  assert_eq!(listed, vec![definition()]);
}

// ─── Schema cache ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_rederives_schema_from_registry() {
  let first = registered().await;
  first.create(instance("default", "a", json!({}))).await.unwrap();

  let second = SqliteStore::from_connection(first.connection().clone())
    .await
    .unwrap();
  second.create(instance("default", "b", json!({}))).await.unwrap();

  let listed = second
    .list(None, &custom(), &LabelSelector::everything())
    .await
    .unwrap();
  assert_eq!(names(&listed), vec!["a", "b"]);
}

#[tokio::test]
async fn concurrent_first_writes_share_one_schema() {
  let first = registered().await;
  let fresh = SqliteStore::from_connection(first.connection().clone())
    .await
    .unwrap();

  let mut handles = Vec::new();
  for i in 0..8 {
    let s = fresh.clone();
    handles.push(tokio::spawn(async move {
      s.create(instance("default", &format!("doc-{i}"), json!({}))).await
    }));
  }
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let a = fresh.mapping(&custom()).await.unwrap();
  let b = fresh.mapping(&custom()).await.unwrap();
  assert!(std::sync::Arc::ptr_eq(&a, &b));

  let listed = fresh
    .list(Some("default"), &custom(), &LabelSelector::everything())
    .await
    .unwrap();
  assert_eq!(listed.len(), 8);
}
