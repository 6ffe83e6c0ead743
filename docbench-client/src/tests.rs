use std::collections::BTreeMap;

use docbench_test::server::TestServer;
use reqwest::StatusCode;
use serde_json::json;

use super::*;

fn document(value: &str) -> BTreeMap<&'static str, String> {
    BTreeMap::from([("data0", value.to_owned()), ("data1", format!("{value}-1"))])
}

#[tokio::test]
async fn pings_the_cluster() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();

    let info = client.ping().await.unwrap();
    assert_eq!(info.name, "docbench-test");
    assert_eq!(info.cluster_name, "docbench");
    assert_eq!(info.version.number, "7.17.0");
}

#[tokio::test]
async fn provisions_index_and_mapping() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();
    let index = Index::new("bench");

    assert!(!client.index_exists(&index).await.unwrap());
    assert!(client.create_index(&index).await.unwrap().acknowledged);
    assert!(client.index_exists(&index).await.unwrap());

    let mapping = json!({ "properties": { "data0": { "type": "keyword" } } });
    assert!(client.put_mapping(&index, &mapping).await.unwrap().acknowledged);
    assert_eq!(server.documents().mapping("bench"), Some(mapping));

    // creating it a second time is rejected by the service
    let err = client.create_index(&index).await.unwrap_err();
    let Error::Status { status, reason } = err else {
        panic!("expected a status error");
    };
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason, "index [bench] already exists");
}

#[tokio::test]
async fn creates_and_counts_documents() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();
    let index = Index::new("bench");

    let id = client.create(&index, "first", &document("a")).await.unwrap();
    assert_eq!(id, "first");
    client.create(&index, "second", &document("b")).await.unwrap();

    assert_eq!(client.count_term(&index, "data0", "a").await.unwrap(), 1);
    assert_eq!(client.count_term(&index, "data1", "b-1").await.unwrap(), 1);
    assert_eq!(client.count_term(&index, "data0", "c").await.unwrap(), 0);

    client.flush(&index).await.unwrap();
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();
    let index = Index::new("bench");

    client.create(&index, "taken", &document("a")).await.unwrap();
    let err = client.create(&index, "taken", &document("b")).await.unwrap_err();

    assert!(matches!(&err, Error::Status { status, .. } if *status == StatusCode::CONFLICT));
    assert_eq!(
        err.to_string(),
        "status 409 Conflict: [taken]: version conflict, document already exists"
    );
    assert_eq!(server.documents().count("bench"), 1);
}

#[tokio::test]
async fn bulk_reports_per_item() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();
    let index = Index::new("bench");

    client.create(&index, "b", &document("existing")).await.unwrap();

    let batch = vec![
        ("a".to_owned(), document("a")),
        ("b".to_owned(), document("b")),
        ("c".to_owned(), document("c")),
    ];
    let response = client.bulk_create(&index, &batch).await.unwrap();

    assert!(response.has_errors());
    let succeeded: Vec<_> = response.succeeded().map(|item| item.id.as_str()).collect();
    assert_eq!(succeeded, ["a", "c"]);

    let failed: Vec<_> = response.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "b");
    assert_eq!(failed[0].status, 409);
    assert_eq!(
        failed[0].error.as_deref(),
        Some("[b]: version conflict, document already exists")
    );

    assert_eq!(server.documents().count("bench"), 3);
}

#[tokio::test]
async fn searching_a_missing_index_fails() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();

    let err = client
        .count_term(&Index::new("missing"), "data0", "a")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status { status, .. } if status == StatusCode::NOT_FOUND));
}

#[test]
fn typed_index_endpoints() {
    let client = Client::builder("http://localhost:9200/prefix/").build().unwrap();

    let url = client.endpoint(&["bench", "doc", "some id", "_create"]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:9200/prefix/bench/doc/some%20id/_create");

    let url = client.endpoint(&[]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:9200/prefix");

    assert_eq!(Index::new("bench").with_type("").doc_type(), None);
    assert_eq!(Index::new("bench").with_type("doc").doc_type(), Some("doc"));
}

#[test]
fn rejects_non_base_urls() {
    let result = Client::builder("mailto:someone@example.com").build();
    assert!(result.is_err());
}
