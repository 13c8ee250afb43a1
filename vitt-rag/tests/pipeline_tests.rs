//! End-to-end tests of index provisioning, indexing and retrieval against
//! the in-memory backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::Level;
use vitt_rag::{
    Document, Embedder, HashEmbedder, InMemoryVectorIndex, IndexManager, IndexSpec, LockFile,
    Metric, RagConfig, RagError, RagPipeline, SourceRecord, VectorIndex,
};

const INDEX: &str = "financial-research";

fn config(top_k: usize) -> RagConfig {
    RagConfig::builder().index_name(INDEX).max_documents_retrieved(top_k).build().unwrap()
}

async fn pipeline_with(index: Arc<InMemoryVectorIndex>, dimension: usize) -> RagPipeline {
    RagPipeline::builder()
        .config(config(5))
        .embedder(Arc::new(HashEmbedder::new(dimension)))
        .vector_index(index)
        .build()
        .await
        .unwrap()
}

async fn pipeline(dimension: usize) -> RagPipeline {
    pipeline_with(Arc::new(InMemoryVectorIndex::new()), dimension).await
}

fn spec(name: &str, dimension: usize) -> IndexSpec {
    IndexSpec {
        name: name.to_string(),
        dimension,
        metric: Metric::Cosine,
        cloud: "aws".to_string(),
        region: "us-east-1".to_string(),
    }
}

/// Embeds like [`HashEmbedder`] but fails on one poisoned text.
struct PoisonedEmbedder {
    inner: HashEmbedder,
    poison: &'static str,
}

#[async_trait]
impl Embedder for PoisonedEmbedder {
    fn model_id(&self) -> &str {
        "poisoned"
    }

    async fn embed(&self, text: &str) -> vitt_rag::Result<Vec<f32>> {
        if text == self.poison {
            return Err(RagError::EmbeddingError {
                provider: "poisoned".into(),
                message: "model unavailable".into(),
            });
        }
        self.inner.embed(text).await
    }
}

#[tokio::test]
async fn indexed_document_is_retrieved_with_exact_text() {
    let pipeline = pipeline(384).await;
    let text = "Reliance Industries reported record quarterly profit.";
    let document = Document::new(text)
        .with_source("Indian Stock API")
        .with_field("doc_type", "indian_stock_data");

    let id = pipeline.index_document(document).await.unwrap();
    assert!(!id.is_empty());

    let results = pipeline.retrieve_relevant_documents("Reliance profit", Some(1)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, id);
    assert_eq!(results[0].text, text);
    assert_eq!(results[0].source, "Indian Stock API");
    assert_eq!(results[0].date, "");
    assert_eq!(results[0].metadata["doc_type"], json!("indian_stock_data"));
}

#[tokio::test]
async fn caller_supplied_text_metadata_is_overridden() {
    let pipeline = pipeline(64).await;
    let document = Document::new("Nifty closes higher").with_field("text", "something else");

    pipeline.index_document(document).await.unwrap();

    let results = pipeline.retrieve_relevant_documents("Nifty", None).await.unwrap();
    assert_eq!(results[0].text, "Nifty closes higher");
    assert_eq!(results[0].metadata["text"], json!("Nifty closes higher"));
}

#[tokio::test]
async fn results_are_in_descending_score_order() {
    let pipeline = pipeline(64).await;
    let texts = [
        "TCS wins large deal in Europe",
        "Infosys cuts revenue guidance",
        "HDFC Bank deposit growth slows",
        "Tata Motors EV sales surge",
        "SBI net interest margin steady",
        "Adani Ports volumes rise",
    ];
    for text in texts {
        pipeline.index_document(Document::new(text)).await.unwrap();
    }

    let results =
        pipeline.retrieve_relevant_documents("Tata Motors EV sales surge", Some(4)).await.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].text, "Tata Motors EV sales surge");
    assert!((results[0].score - 1.0).abs() < 1e-4);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn top_k_defaults_to_configured_limit() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = RagPipeline::builder()
        .config(config(2))
        .embedder(Arc::new(HashEmbedder::new(32)))
        .vector_index(index)
        .build()
        .await
        .unwrap();
    for i in 0..5 {
        pipeline.index_document(Document::new(format!("filing {i}"))).await.unwrap();
    }

    let results = pipeline.retrieve_relevant_documents("filing", None).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn empty_index_retrieves_nothing() {
    let pipeline = pipeline(32).await;
    let results = pipeline.retrieve_relevant_documents("anything", Some(3)).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn zero_top_k_is_invalid_argument() {
    let pipeline = pipeline(32).await;
    let err = pipeline.retrieve_relevant_documents("anything", Some(0)).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));
}

#[tokio::test]
async fn reindexing_an_id_keeps_only_the_latest_text() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = pipeline_with(Arc::clone(&index), 32).await;

    pipeline.index_document(Document::new("first draft").with_id("doc-1")).await.unwrap();
    let id = pipeline.index_document(Document::new("final text").with_id("doc-1")).await.unwrap();
    assert_eq!(id, "doc-1");
    assert_eq!(index.record_count(INDEX).await, Some(1));

    let results = pipeline.retrieve_relevant_documents("final text", Some(5)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "final text");
}

#[tokio::test]
async fn blank_text_or_id_is_rejected() {
    let pipeline = pipeline(32).await;

    let err = pipeline.index_document(Document::new("   ")).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));

    let err = pipeline.index_document(Document::new("text").with_id(" ")).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));
}

#[tokio::test]
async fn embedding_failure_is_propagated_and_nothing_is_stored() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = RagPipeline::builder()
        .config(config(5))
        .embedder(Arc::new(PoisonedEmbedder { inner: HashEmbedder::new(16), poison: "bad" }))
        .vector_index(Arc::clone(&index) as Arc<dyn VectorIndex>)
        .build()
        .await
        .unwrap();

    let err = pipeline.index_document(Document::new("bad")).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(index.record_count(INDEX).await, Some(0));

    let err = pipeline.retrieve_relevant_documents("bad", None).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
}

#[tokio::test]
async fn batch_indexing_stops_at_first_failure() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = RagPipeline::builder()
        .config(config(5))
        .embedder(Arc::new(PoisonedEmbedder { inner: HashEmbedder::new(16), poison: "bad" }))
        .vector_index(Arc::clone(&index) as Arc<dyn VectorIndex>)
        .build()
        .await
        .unwrap();

    let docs = ["one", "bad", "three"].map(Document::new);
    let err = pipeline.index_documents(docs).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(index.record_count(INDEX).await, Some(1));
}

#[tokio::test]
async fn missing_index_is_created_with_embedder_dimension() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = pipeline_with(Arc::clone(&index), 384).await;

    assert_eq!(pipeline.index().dimension(), 384);
    let description = index.describe_index(INDEX).await.unwrap();
    assert_eq!(description.dimension, 384);
    assert_eq!(description.metric, Metric::Cosine);
}

#[tokio::test]
async fn matching_index_is_reused_with_its_vectors() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let first = pipeline_with(Arc::clone(&index), 32).await;
    first.index_document(Document::new("kept across restarts")).await.unwrap();

    let second = pipeline_with(Arc::clone(&index), 32).await;
    let results = second.retrieve_relevant_documents("kept across restarts", Some(1)).await.unwrap();
    assert_eq!(results[0].text, "kept across restarts");
}

#[tokio::test]
async fn dimension_mismatch_recreates_index_and_warns() {
    let (subscriber, events) = vitt_telemetry::capture::subscriber();
    let _guard = tracing::subscriber::set_default(subscriber);

    let index = Arc::new(InMemoryVectorIndex::new());
    index.create_index(&spec(INDEX, 768)).await.unwrap();
    index
        .upsert(
            INDEX,
            &[vitt_rag::VectorRecord {
                id: "old".into(),
                values: vec![0.1; 768],
                metadata: Default::default(),
            }],
        )
        .await
        .unwrap();

    let manager = IndexManager::new(Arc::clone(&index) as Arc<dyn VectorIndex>, "aws", "us-east-1");
    let handle = manager.ensure_index(INDEX, &HashEmbedder::new(384)).await.unwrap();

    assert_eq!(handle.dimension(), 384);
    assert_eq!(index.describe_index(INDEX).await.unwrap().dimension, 384);
    assert_eq!(index.record_count(INDEX).await, Some(0));

    let warnings = events.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("dimension mismatch"));
    assert_eq!(warnings[0].fields["index_dimension"], json!(768));
    assert_eq!(warnings[0].fields["model_dimension"], json!(384));
}

#[tokio::test]
async fn concurrent_provisioning_creates_one_index() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let embedder = HashEmbedder::new(48);
    let manager = IndexManager::new(Arc::clone(&index) as Arc<dyn VectorIndex>, "aws", "us-east-1");

    let (a, b) = tokio::join!(
        manager.ensure_index("shared", &embedder),
        manager.ensure_index("shared", &embedder)
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(index.list_index_names().await.unwrap(), vec!["shared".to_string()]);
}

#[tokio::test]
async fn lock_file_serialises_provisioning() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = RagPipeline::builder()
        .config(config(5))
        .embedder(Arc::new(HashEmbedder::new(16)))
        .vector_index(Arc::clone(&index) as Arc<dyn VectorIndex>)
        .provision_lock(Arc::new(LockFile::new(dir.path())))
        .build()
        .await
        .unwrap();

    assert_eq!(pipeline.index().dimension(), 16);
    // The guard is released once provisioning finishes.
    assert!(!LockFile::new(dir.path()).path_for(INDEX).exists());
}

#[tokio::test]
async fn missing_embedder_is_a_config_error() {
    let result = RagPipeline::builder().vector_index(Arc::new(InMemoryVectorIndex::new())).build().await;
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn source_records_index_and_retrieve() {
    let pipeline = pipeline(64).await;
    let record: SourceRecord = serde_json::from_value(json!({
        "kind": "stock_data",
        "stock_name": "RELIANCE",
        "company_name": "Reliance Industries",
        "industry": "Oil & Gas"
    }))
    .unwrap();
    let document = record.into_document().unwrap();
    let text = document.text.clone();

    let id = pipeline.index_document(document).await.unwrap();
    assert!(id.starts_with("indian_stock_RELIANCE_"));

    let results = pipeline.retrieve_relevant_documents(&text, Some(1)).await.unwrap();
    assert_eq!(results[0].id, id);
    assert_eq!(results[0].source, "Indian Stock API");
}
