//! HTTP-level tests: the full router over an in-memory store.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use crud_forge::config::parse_entities;
use crud_forge::store::UniqueKey;
use crud_forge::{build_router, memory_store, AppConfig, Record, RepositoryRegistry, Store, StoreError};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Counts writes reaching the store.
struct CountingStore {
    inner: Arc<dyn Store>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

#[async_trait]
impl Store for CountingStore {
    async fn find_many(&self, entity: &str, filter: Option<(&str, &str)>) -> Result<Vec<Record>, StoreError> {
        self.inner.find_many(entity, filter).await
    }

    async fn find_where_in(&self, entity: &str, field: &str, values: &[Value]) -> Result<Vec<Record>, StoreError> {
        self.inner.find_where_in(entity, field, values).await
    }

    async fn find_unique(&self, entity: &str, key: UniqueKey<'_>) -> Result<Option<Record>, StoreError> {
        self.inner.find_unique(entity, key).await
    }

    async fn insert(&self, entity: &str, data: &Record) -> Result<Record, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(entity, data).await
    }

    async fn update(&self, entity: &str, id: i64, patch: &Record) -> Result<Record, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(entity, id, patch).await
    }

    async fn delete(&self, entity: &str, id: i64) -> Result<(), StoreError> {
        self.inner.delete(entity, id).await
    }

    fn has_field(&self, entity: &str, field: &str) -> Result<bool, StoreError> {
        self.inner.has_field(entity, field)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Every data operation fails; lookups with a database error, deletes with a constraint.
struct BrokenStore;

fn db_down() -> StoreError {
    StoreError::Db(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl Store for BrokenStore {
    async fn find_many(&self, _: &str, _: Option<(&str, &str)>) -> Result<Vec<Record>, StoreError> {
        Err(db_down())
    }

    async fn find_where_in(&self, _: &str, _: &str, _: &[Value]) -> Result<Vec<Record>, StoreError> {
        Err(db_down())
    }

    async fn find_unique(&self, _: &str, _: UniqueKey<'_>) -> Result<Option<Record>, StoreError> {
        Err(db_down())
    }

    async fn insert(&self, _: &str, _: &Record) -> Result<Record, StoreError> {
        Err(db_down())
    }

    async fn update(&self, _: &str, _: i64, _: &Record) -> Result<Record, StoreError> {
        Err(db_down())
    }

    async fn delete(&self, _: &str, _: i64) -> Result<(), StoreError> {
        Err(StoreError::Constraint(
            "update or delete on table \"category\" violates foreign key constraint".into(),
        ))
    }

    fn has_field(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(db_down())
    }
}

fn config() -> AppConfig {
    AppConfig::with_entities(parse_entities(["product", "category", "user"]).unwrap())
}

fn app_with(config: &AppConfig) -> (Router, Arc<CountingStore>) {
    let store = Arc::new(CountingStore {
        inner: Arc::new(memory_store(config).unwrap()),
        inserts: AtomicUsize::new(0),
        updates: AtomicUsize::new(0),
    });
    let router = build_router(config, store.clone(), &RepositoryRegistry::default()).unwrap();
    (router, store)
}

fn app() -> (Router, Arc<CountingStore>) {
    app_with(&config())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    send_request(app, request).await
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create(app: &Router, entity: &str, body: Value) -> Value {
    let (status, created) = send(app, Method::POST, &format!("/api/{}", entity), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "create {entity}: {created}");
    created
}

#[tokio::test]
async fn created_record_is_reachable_by_id_and_by_code() {
    let (app, _) = app();
    let created = create(&app, "product", json!({ "name": "X", "price": 10 })).await;

    let id = created["id"].as_i64().unwrap();
    let code = created["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 5);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    let (status, by_id) = send(&app, Method::GET, &format!("/api/product/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id, created);

    let (status, by_code) = send(&app, Method::GET, &format!("/api/product/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code, created);
}

#[tokio::test]
async fn client_supplied_codes_are_kept() {
    let (app, _) = app();
    create(&app, "product", json!({ "name": "X", "code": "AB3x9" })).await;
    let (status, found) = send(&app, Method::GET, "/api/product/AB3x9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["name"], "X");

    let (status, body) = send(&app, Method::GET, "/api/product/ZZ9zz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn deleted_records_are_gone() {
    let (app, _) = app();
    let created = create(&app, "product", json!({ "name": "X" })).await;
    let uri = format!("/api/product/{}", created["id"]);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_code_is_rejected_without_insert() {
    let (app, store) = app();
    create(&app, "product", json!({ "name": "X", "code": "AB3x9" })).await;
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/product",
        Some(json!({ "name": "Y", "code": "AB3x9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);

    let (_, all) = send(&app, Method::GET, "/api/product", None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn client_supplied_id_is_rejected_without_insert() {
    let (app, store) = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/product",
        Some(json!({ "id": 7, "name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn numeric_codes_are_rejected() {
    let (app, store) = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/product",
        Some(json!({ "name": "X", "code": "12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_bodies_are_rejected() {
    let (app, store) = app();
    let (status, _) = send(&app, Method::POST, "/api/product", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for body in [json!({}), json!([]), Value::Null] {
        let (status, _) = send(&app, Method::POST, "/api/product", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/product")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send_request(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn updating_a_missing_record_never_reaches_the_store() {
    let (app, store) = app();
    let (status, _) = send(&app, Method::PUT, "/api/product/999", Some(json!({ "name": "Y" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn put_and_patch_both_merge() {
    let (app, _) = app();
    let created = create(&app, "product", json!({ "name": "X", "price": 10 })).await;
    let uri = format!("/api/product/{}", created["id"]);

    let (status, updated) = send(&app, Method::PUT, &uri, Some(json!({ "price": 12 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "X");
    assert_eq!(updated["price"], 12);
    assert_eq!(updated["code"], created["code"]);

    let (status, patched) = send(&app, Method::PATCH, &uri, Some(json!({ "name": "Z" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Z");
    assert_eq!(patched["price"], 12);
}

#[tokio::test]
async fn updates_cannot_take_another_records_code() {
    let (app, store) = app();
    create(&app, "product", json!({ "name": "A", "code": "AAAAA" })).await;
    let b = create(&app, "product", json!({ "name": "B" })).await;
    let uri = format!("/api/product/{}", b["id"]);

    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({ "code": "AAAAA" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);

    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({ "code": b["code"] }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let (app, _) = app();
    for uri in ["/api/product/0", "/api/product/000", "/api/product/99999999999999999999"] {
        let (status, _) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    let (status, _) = send(&app, Method::DELETE, "/api/product/AB3x9", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn products_are_listed_with_their_category() {
    let (app, _) = app();
    let category = create(&app, "category", json!({ "name": "Tools" })).await;
    create(
        &app,
        "product",
        json!({ "name": "Hammer", "categoryId": category["id"] }),
    )
    .await;
    create(&app, "product", json!({ "name": "Loose" })).await;

    let (status, products) = send(&app, Method::GET, "/api/product", None).await;
    assert_eq!(status, StatusCode::OK);
    let products = products.as_array().unwrap();
    assert_eq!(products[0]["category"]["name"], "Tools");
    assert_eq!(products[1]["category"], Value::Null);

    let (_, categories) = send(&app, Method::GET, "/api/category", None).await;
    let products_of = categories[0]["products"].as_array().unwrap();
    assert_eq!(products_of.len(), 1);
    assert_eq!(products_of[0]["name"], "Hammer");
}

#[tokio::test]
async fn entities_without_relations_are_listed_plain() {
    let (app, _) = app();
    let user = create(&app, "user", json!({ "name": "Ada", "email": "ada@example.com" })).await;
    let (status, users) = send(&app, Method::GET, "/api/user", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users, json!([user]));
}

#[tokio::test]
async fn records_can_be_listed_by_any_field() {
    let (app, _) = app();
    create(&app, "product", json!({ "name": "A", "price": 10 })).await;
    create(&app, "product", json!({ "name": "B", "price": 10 })).await;
    create(&app, "product", json!({ "name": "C", "price": 11 })).await;

    let (status, found) = send(&app, Method::GET, "/api/product/price/10", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["A", "B"]);

    let (status, found) = send(&app, Method::GET, "/api/product/name/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, json!([]));
}

#[tokio::test]
async fn unknown_fields_are_server_errors_without_detail() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/product/colour/red", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "storage_error");
    assert_eq!(body["error"]["message"], "internal server error");
}

#[tokio::test]
async fn entities_mount_at_the_root_without_a_prefix() {
    let mut config = config();
    config.api_path_prefix = None;
    let (app, _) = app_with(&config);

    let (status, _) = send(&app, Method::POST, "/product", Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, all) = send(&app, Method::GET, "/product", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/product", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn common_routes_report_health_and_entities() {
    let (app, _) = app();
    let (status, health) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health, json!({ "status": "ok" }));

    let (status, ready) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ready["status"], "ok");

    let (status, info) = send(&app, Method::GET, "/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["entities"], json!(["product", "category", "user"]));
}

#[tokio::test]
async fn a_lone_product_entity_lists_without_its_category() {
    let config = AppConfig::with_entities(parse_entities(["product"]).unwrap());
    let (app, _) = app_with(&config);
    let (status, all) = send(&app, Method::GET, "/api/product", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all, json!([]));

    create(&app, "product", json!({ "name": "X", "categoryId": 1 })).await;
    let (status, all) = send(&app, Method::GET, "/api/product", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all[0]["name"], "X");
    assert_eq!(all[0]["category"], Value::Null);
}

#[tokio::test]
async fn store_failures_are_generic_server_errors() {
    let store: Arc<dyn Store> = Arc::new(BrokenStore);
    let app = build_router(&config(), store, &RepositoryRegistry::default()).unwrap();
    let generic = json!({ "error": { "code": "storage_error", "message": "internal server error" } });

    let cases = [
        (Method::GET, "/api/product", None),
        (Method::GET, "/api/user", None),
        (Method::GET, "/api/product/1", None),
        (Method::GET, "/api/product/AB3x9", None),
        (Method::GET, "/api/product/name/X", None),
        (Method::POST, "/api/product", Some(json!({ "name": "X" }))),
        (Method::PUT, "/api/product/1", Some(json!({ "name": "Y" }))),
        (Method::PATCH, "/api/product/1", Some(json!({ "name": "Y" }))),
        (Method::DELETE, "/api/category/1", None),
    ];
    for (method, uri, body) in cases {
        let label = format!("{method} {uri}");
        let (status, response) = send(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{label}");
        assert_eq!(response, generic, "{label}");
    }

    let (status, ready) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready, json!({ "status": "degraded", "database": "unavailable" }));
}

#[tokio::test]
async fn updating_a_missing_record_is_not_found_even_with_a_taken_code() {
    let (app, store) = app();
    create(&app, "product", json!({ "name": "A", "code": "AAAAA" })).await;
    let (status, body) = send(&app, Method::PUT, "/api/product/999", Some(json!({ "code": "AAAAA" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn codes_with_slashes_are_rejected() {
    let (app, store) = app();
    let (status, _) = send(&app, Method::POST, "/api/product", Some(json!({ "name": "X", "code": "A/B" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}
