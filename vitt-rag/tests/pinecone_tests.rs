//! Pinecone backend tests against a local mock server.

#![cfg(feature = "pinecone")]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vitt_rag::{
    Document, HashEmbedder, IndexSpec, Metadata, Metric, PineconeIndex, RagConfig, RagError,
    RagPipeline, RetryPolicy, RetryingVectorIndex, VectorIndex, VectorRecord,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> PineconeIndex {
    PineconeIndex::new("test-key")
        .unwrap()
        .with_control_url(server.uri())
        .with_ready_wait(Duration::from_secs(2), Duration::from_millis(10))
}

fn description(server: &MockServer, name: &str, dimension: usize) -> serde_json::Value {
    json!({
        "name": name,
        "dimension": dimension,
        "metric": "cosine",
        "host": server.uri(),
        "status": {"ready": true, "state": "Ready"}
    })
}

#[tokio::test]
async fn lists_index_names_with_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .and(header("Api-Key", "test-key"))
        .and(header("X-Pinecone-API-Version", "2024-07"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [description(&server, "a", 8), description(&server, "b", 16)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let names = client(&server).list_index_names().await.unwrap();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn create_sends_serverless_spec_and_waits_for_ready() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_partial_json(json!({
            "name": "filings",
            "dimension": 384,
            "metric": "cosine",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 384)))
        .mount(&server)
        .await;

    let spec = IndexSpec {
        name: "filings".into(),
        dimension: 384,
        metric: Metric::Cosine,
        cloud: "aws".into(),
        region: "us-east-1".into(),
    };
    client(&server).create_index(&spec).await.unwrap();
}

fn filings_spec(dimension: usize) -> IndexSpec {
    IndexSpec {
        name: "filings".into(),
        dimension,
        metric: Metric::Cosine,
        cloud: "aws".into(),
        region: "us-east-1".into(),
    }
}

#[tokio::test]
async fn create_conflict_waits_for_existing_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": "ALREADY_EXISTS", "message": "Resource filings already exists"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 384)))
        .mount(&server)
        .await;

    client(&server).create_index(&filings_spec(384)).await.unwrap();
}

#[tokio::test]
async fn create_conflict_with_other_dimension_is_provision_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 768)))
        .mount(&server)
        .await;

    let err = client(&server).create_index(&filings_spec(384)).await.unwrap_err();
    assert!(matches!(err, RagError::IndexProvisionError { ref message, .. } if message.contains("768")));
}

#[tokio::test]
async fn retried_create_resumes_after_ready_wait_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1..)
        .mount(&server)
        .await;
    let mut initializing = description(&server, "filings", 384);
    initializing["status"] = json!({"ready": false, "state": "Initializing"});
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(initializing))
        .up_to_n_times(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 384)))
        .mount(&server)
        .await;

    let pinecone = PineconeIndex::new("test-key")
        .unwrap()
        .with_control_url(server.uri())
        .with_ready_wait(Duration::from_millis(25), Duration::from_millis(10));
    let index = RetryingVectorIndex::new(Arc::new(pinecone), RetryPolicy::new(5, Duration::from_millis(1)));

    index.create_index(&filings_spec(384)).await.unwrap();
}

#[tokio::test]
async fn delete_waits_until_index_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NOT_FOUND", "message": "Resource filings not found"}
        })))
        .mount(&server)
        .await;

    client(&server).delete_index("filings").await.unwrap();
}

#[tokio::test]
async fn control_plane_failure_is_provision_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NOT_FOUND", "message": "Resource missing not found"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).describe_index("missing").await.unwrap_err();
    match err {
        RagError::IndexProvisionError { index, message } => {
            assert_eq!(index, "missing");
            assert!(message.contains("Resource missing not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn upsert_drops_null_metadata_and_query_parses_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_partial_json(json!({
            "vectors": [{"id": "doc-1", "values": [1.0, 0.0], "metadata": {"text": "hello"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"topK": 3, "includeMetadata": true, "includeValues": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "doc-1", "score": 0.98, "metadata": {"text": "hello"}},
                {"id": "doc-2", "score": 0.41}
            ],
            "namespace": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = client(&server);
    let mut metadata = Metadata::new();
    metadata.insert("text".into(), json!("hello"));
    metadata.insert("date".into(), serde_json::Value::Null);
    index
        .upsert("filings", &[VectorRecord { id: "doc-1".into(), values: vec![1.0, 0.0], metadata }])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let upsert = requests.iter().find(|r| r.url.path() == "/vectors/upsert").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&upsert.body).unwrap();
    assert!(body["vectors"][0]["metadata"].get("date").is_none());

    // The data-plane host is cached; no second describe.
    let matches = index.query("filings", &[1.0, 0.0], 3, true).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "doc-1");
    assert_eq!(matches[0].metadata["text"], json!("hello"));
    assert!(matches[1].metadata.is_empty());
}

#[tokio::test]
async fn data_plane_failures_map_to_store_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(description(&server, "filings", 2)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad vector"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let index = client(&server);
    let record = VectorRecord { id: "x".into(), values: vec![0.0, 1.0], metadata: Metadata::new() };
    let err = index.upsert("filings", &[record]).await.unwrap_err();
    assert!(matches!(err, RagError::StoreWriteError { ref backend, .. } if backend == "pinecone"));
    assert!(err.is_retryable());

    let err = index.query("filings", &[0.0, 1.0], 1, false).await.unwrap_err();
    assert!(matches!(err, RagError::StoreQueryError { .. }));
}

#[tokio::test]
async fn pipeline_migrates_index_with_wrong_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [description(&server, "financial-research", 768)]
        })))
        .mount(&server)
        .await;
    // Describe reports 768 until the delete lands, then 404, then the new index.
    Mock::given(method("GET"))
        .and(path("/indexes/financial-research"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(description(&server, "financial-research", 768)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/indexes/financial-research"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/financial-research"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_partial_json(json!({"name": "financial-research", "dimension": 32})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/financial-research"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(description(&server, "financial-research", 32)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedder(Arc::new(HashEmbedder::new(32)))
        .vector_index(Arc::new(client(&server)))
        .build()
        .await
        .unwrap();
    assert_eq!(pipeline.index().dimension(), 32);

    pipeline.index_document(Document::new("Sensex gains 400 points")).await.unwrap();
}
