// cirrus-server/tests/http_surface.rs
// ============================================================================
// Module: HTTP Surface Tests
// Description: End-to-end scenarios over a live listener.
// Purpose: Validate routing, auth, envelopes, headers, pagination, and
//          status mapping exactly as a client SDK would observe them.
// Dependencies: cirrus-core, cirrus-server, reqwest, serde_json, tokio
// ============================================================================

//! End-to-end coverage: each test binds an isolated server on an ephemeral
//! port (plain HTTP to keep the client side simple) and drives it with
//! reqwest.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use cirrus_core::DataStore;
use cirrus_server::ApiServer;
use cirrus_server::EMULATOR_MASTER_KEY;
use cirrus_server::ServerConfig;
use cirrus_server::TlsMode;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;

/// Binds an isolated server and returns its base URL.
async fn spawn(store: DataStore) -> String {
    let config = ServerConfig {
        tls: TlsMode::Disabled,
        ..ServerConfig::default()
    };
    let server = ApiServer::new(config, store);
    let router = server.router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

/// Client preloaded with the emulator master key.
fn client() -> Client {
    Client::new()
}

fn auth() -> (&'static str, &'static str) {
    ("authorization", EMULATOR_MASTER_KEY)
}

/// Seeds `db1/c` with a single-path partition key.
async fn seed_database(base: &str) {
    let http = client();
    let response = http
        .post(format!("{base}/dbs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "db1"}))
        .send()
        .await
        .expect("create db");
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = http
        .post(format!("{base}/dbs/db1/colls"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "c", "partitionKey": {"paths": ["/pk"]}}))
        .send()
        .await
        .expect("create collection");
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn create_and_read_document_round_trip() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();

    let response = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A", "v": 1}))
        .send()
        .await
        .expect("create document");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get("x-ms-request-charge").unwrap(), "1");
    assert!(response.headers().contains_key("x-ms-activity-id"));
    let created: Value = response.json().await.expect("json body");
    assert!(created["_etag"].as_str().unwrap().starts_with('"'));
    assert!(created.get("_rid").is_some());
    assert!(created.get("_self").is_some());
    assert!(created.get("_ts").is_some());

    let response = http
        .get(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .send()
        .await
        .expect("read document");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["v"], json!(1));
}

#[tokio::test]
async fn if_match_conflict_returns_412_and_preserves_the_document() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A", "v": 1}))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("body");
    let etag = created["_etag"].as_str().unwrap().to_string();

    let first = http
        .put(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .header("if-match", &etag)
        .json(&json!({"id": "d1", "pk": "A", "v": 2}))
        .send()
        .await
        .expect("first put");
    assert_eq!(first.status(), StatusCode::OK);

    let second = http
        .put(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .header("if-match", &etag)
        .json(&json!({"id": "d1", "pk": "A", "v": 3}))
        .send()
        .await
        .expect("second put");
    assert_eq!(second.status(), StatusCode::PRECONDITION_FAILED);

    let read: Value = http
        .get(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .send()
        .await
        .expect("read")
        .json()
        .await
        .expect("body");
    assert_eq!(read["v"], json!(2));
}

#[tokio::test]
async fn parameterized_query_filters_by_three_valued_logic() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    for doc in [json!({"pk": "A", "v": 1}), json!({"pk": "A", "v": 2}), json!({"pk": "A", "v": "x"})]
    {
        let response = http
            .post(format!("{base}/dbs/db1/colls/c/docs"))
            .header(auth().0, auth().1)
            .json(&doc)
            .send()
            .await
            .expect("create");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-isquery", "true")
        .json(&json!({
            "query": "SELECT VALUE c.v FROM c WHERE c.v >= @min",
            "parameters": [{"name": "@min", "value": 1}],
        }))
        .send()
        .await
        .expect("query");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["Documents"], json!([1, 2]));
    assert_eq!(body["_count"], json!(2));
    assert!(body.get("_rid").is_some());
}

#[tokio::test]
async fn cross_partition_query_pages_until_the_final_page() {
    let store = DataStore::with_partition_count(3);
    store.create_database(json!({"id": "db1"})).expect("db");
    store
        .create_collection("db1", json!({"id": "c", "partitionKey": {"paths": ["/pk"]}}))
        .expect("coll");
    for n in 0 .. 300 {
        store
            .create_document(
                "db1",
                "c",
                json!({"id": format!("d{n}"), "pk": format!("t{n}"), "n": n}),
                false,
                None,
            )
            .expect("doc");
    }
    let base = spawn(store).await;
    let http = client();

    let mut pages = 0;
    let mut rows = 0;
    let mut continuation: Option<String> = None;
    loop {
        let mut request = http
            .post(format!("{base}/dbs/db1/colls/c/docs"))
            .header(auth().0, auth().1)
            .header("x-ms-documentdb-isquery", "true")
            .header("x-ms-documentdb-query-enablecrosspartition", "true")
            .header("x-ms-max-item-count", "50")
            .json(&json!({"query": "SELECT VALUE c.id FROM c"}));
        if let Some(token) = &continuation {
            request = request.header("x-ms-continuation", token);
        }
        let response = request.send().await.expect("page");
        assert_eq!(response.status(), StatusCode::OK);
        let token = response
            .headers()
            .get("x-ms-continuation")
            .map(|value| value.to_str().unwrap().to_string());
        let body: Value = response.json().await.expect("body");
        pages += 1;
        rows += body["Documents"].as_array().unwrap().len();
        match token {
            Some(token) => continuation = Some(token),
            None => break,
        }
        assert!(pages < 100, "pagination did not terminate");
    }
    assert_eq!(pages, 6, "300 rows at 50 per page is exactly 6 pages");
    assert_eq!(rows, 300);
}

#[tokio::test]
async fn cross_partition_queries_require_the_enabling_header() {
    let store = DataStore::with_partition_count(3);
    store.create_database(json!({"id": "db1"})).expect("db");
    store
        .create_collection("db1", json!({"id": "c", "partitionKey": {"paths": ["/pk"]}}))
        .expect("coll");
    let base = spawn(store).await;
    let response = client()
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-isquery", "true")
        .json(&json!({"query": "SELECT * FROM c"}))
        .send()
        .await
        .expect("query");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["code"], json!("BadRequest"));
}

#[tokio::test]
async fn patch_failures_are_atomic() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    let response = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A", "a": 0, "b": "text"}))
        .send()
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = http
        .patch(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .json(&json!({"operations": [
            {"op": "set", "path": "/a", "value": 1},
            {"op": "incr", "path": "/b", "value": 1},
        ]}))
        .send()
        .await
        .expect("patch");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let read: Value = http
        .get(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .send()
        .await
        .expect("read")
        .json()
        .await
        .expect("body");
    assert_eq!(read["a"], json!(0));
    assert_eq!(read["b"], json!("text"));
}

#[tokio::test]
async fn database_delete_cascades_to_every_dependent_route() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    let response = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A"}))
        .send()
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = http
        .delete(format!("{base}/dbs/db1"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("delete db");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for path in [
        "/dbs/db1",
        "/dbs/db1/colls/c",
        "/dbs/db1/colls/c/docs/d1",
        "/dbs/db1/colls/c/pkranges",
    ] {
        let response = http
            .get(format!("{base}{path}"))
            .header(auth().0, auth().1)
            .send()
            .await
            .expect("read after cascade");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");
    }
}

#[tokio::test]
async fn auth_is_enforced_on_every_catalog_route() {
    let base = spawn(DataStore::new()).await;
    let http = client();

    // The banner is public.
    let response = http.get(format!("{base}/")).send().await.expect("banner");
    assert_eq!(response.status(), StatusCode::OK);

    let response = http.get(format!("{base}/dbs")).send().await.expect("no key");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = http
        .get(format!("{base}/dbs"))
        .header("authorization", "wrong-key")
        .send()
        .await
        .expect("wrong key");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["code"], json!("Unauthorized"));

    let response = http
        .get(format!("{base}/dbs"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("right key");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn trailing_slashes_are_rewritten_not_redirected() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let response = client()
        .get(format!("{base}/dbs/db1/"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("read with trailing slash");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["id"], json!("db1"));
}

#[tokio::test]
async fn list_envelopes_have_the_standard_shape() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();

    let body: Value = http
        .get(format!("{base}/dbs"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("list dbs")
        .json()
        .await
        .expect("body");
    assert_eq!(body["_count"], json!(1));
    assert!(body["Databases"].is_array());

    let body: Value = http
        .get(format!("{base}/offers"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("offers")
        .json()
        .await
        .expect("body");
    assert_eq!(body, json!({"_rid": "", "_count": 0, "Offers": []}));

    let body: Value = http
        .get(format!("{base}/dbs/db1/colls/c/pkranges"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("pkranges")
        .json()
        .await
        .expect("body");
    assert_eq!(body["_count"], json!(1));
    assert_eq!(body["PartitionKeyRanges"][0]["id"], json!("0"));
    assert_eq!(body["PartitionKeyRanges"][0]["minInclusive"], json!(""));
    assert_eq!(body["PartitionKeyRanges"][0]["maxExclusive"], json!("FF"));
}

#[tokio::test]
async fn script_resources_round_trip_verbatim() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    let source = "function tax(income) { return income * 0.2; }";

    let response = http
        .post(format!("{base}/dbs/db1/colls/c/udfs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "tax", "body": source}))
        .send()
        .await
        .expect("create udf");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = http
        .get(format!("{base}/dbs/db1/colls/c/udfs/tax"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("read udf")
        .json()
        .await
        .expect("body");
    assert_eq!(body["body"], json!(source));

    let response = http
        .delete(format!("{base}/dbs/db1/colls/c/udfs/tax"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("delete udf");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = http
        .get(format!("{base}/dbs/db1/colls/c/udfs/tax"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("read deleted udf");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_dumps_the_whole_store() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    let response = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A"}))
        .send()
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = http
        .get(format!("{base}/cirrus/export"))
        .header(auth().0, auth().1)
        .send()
        .await
        .expect("export")
        .json()
        .await
        .expect("body");
    assert_eq!(body["Databases"].as_array().unwrap().len(), 1);
    assert_eq!(body["Collections"].as_array().unwrap().len(), 1);
    assert_eq!(body["Documents"].as_array().unwrap().len(), 1);
    assert!(body["Triggers"].is_array());
    assert!(body["Sprocs"].is_array());
    assert!(body["UDFs"].is_array());
}

#[tokio::test]
async fn if_none_match_returns_304_on_unchanged_documents() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    let created: Value = http
        .post(format!("{base}/dbs/db1/colls/c/docs"))
        .header(auth().0, auth().1)
        .json(&json!({"id": "d1", "pk": "A"}))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("body");
    let etag = created["_etag"].as_str().unwrap();

    let response = http
        .get(format!("{base}/dbs/db1/colls/c/docs/d1"))
        .header(auth().0, auth().1)
        .header("x-ms-documentdb-partitionkey", "[\"A\"]")
        .header("if-none-match", etag)
        .send()
        .await
        .expect("conditional read");
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn upsert_header_switches_create_to_replace() {
    let base = spawn(DataStore::new()).await;
    seed_database(&base).await;
    let http = client();
    for (v, expected) in [(1, StatusCode::CREATED), (2, StatusCode::OK)] {
        let response = http
            .post(format!("{base}/dbs/db1/colls/c/docs"))
            .header(auth().0, auth().1)
            .header("x-ms-documentdb-is-upsert", "true")
            .json(&json!({"id": "d1", "pk": "A", "v": v}))
            .send()
            .await
            .expect("upsert");
        assert_eq!(response.status(), expected, "v = {v}");
    }
}
