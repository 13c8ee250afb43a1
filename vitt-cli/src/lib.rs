//! Command-line front end for VittSaar.
//!
//! ```text
//! vitt index filings.json
//! vitt index feed.json --records
//! vitt search "Reliance profit" --top-k 3
//! vitt report "Outlook for Indian IT services" --report-type equity --section Summary --section Risks
//! ```
//!
//! Settings come from the environment (a `.env` file is loaded first):
//! `PINECONE_API_KEY`, `PINECONE_INDEX_NAME`, `PINECONE_CLOUD`,
//! `PINECONE_ENVIRONMENT`, `EMBEDDING_MODEL`, `MAX_DOCUMENTS_RETRIEVED`,
//! `OPENAI_API_KEY` (for non-`hash-*` embedding models) and
//! `GEMINI_API_KEY` / `GOOGLE_API_KEY` (for reports).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use vitt_rag::{
    Document, Embedder, HashEmbedder, InMemoryVectorIndex, LockFile, OpenAIEmbedder,
    PineconeIndex, RagConfig, RagPipeline, RetryingVectorIndex, SourceRecord, VectorIndex,
};
use vitt_report::{GeminiModel, ReportRequest, ReportSynthesizer, RetryingModel};

#[derive(Debug, Parser)]
#[command(name = "vitt")]
#[command(author, version, about = "Index financial documents and generate grounded research reports")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use a throwaway in-memory index instead of Pinecone
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Index this JSON file of documents before running the command
    /// (useful with --in-memory)
    #[arg(long, global = true, value_name = "FILE")]
    pub load: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed and store documents from a JSON array
    Index {
        /// JSON file holding an array of documents
        file: PathBuf,

        /// Treat the file as typed upstream records (news, stock data, ...)
        #[arg(long)]
        records: bool,
    },

    /// Print the documents most relevant to a query
    Search {
        query: String,

        /// Number of documents to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Generate a research report grounded on retrieved documents
    Report {
        query: String,

        /// Analysis flavour, e.g. equity, venture_capital, investment_banking
        #[arg(short = 't', long, default_value = "general")]
        report_type: String,

        /// Write one free-form narrative instead of sections
        #[arg(long)]
        narrative: bool,

        /// Section to generate; repeat for several (defaults to the configured list)
        #[arg(short, long = "section", value_name = "SECTION")]
        sections: Vec<String>,

        /// Number of documents to ground the report on
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

/// Read a JSON array of plain [`Document`]s, or of [`SourceRecord`]s when
/// `records` is set.
pub fn read_documents(path: &Path, records: bool) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !records {
        return serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON array of documents", path.display()));
    }
    let records: Vec<SourceRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of source records", path.display()))?;
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.into_document().with_context(|| format!("record {i}")))
        .collect()
}

fn embedder(config: &RagConfig) -> Result<Arc<dyn Embedder>> {
    if config.embedding_model.starts_with("hash-") {
        return Ok(Arc::new(HashEmbedder::from_model_id(&config.embedding_model)?));
    }
    let mut embedder = OpenAIEmbedder::from_env()?.with_model(&config.embedding_model);
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        embedder = embedder.with_base_url(base_url);
    }
    Ok(Arc::new(embedder))
}

async fn pipeline(cli: &Cli, config: RagConfig) -> Result<RagPipeline> {
    let embedder = embedder(&config)?;
    let mut builder = RagPipeline::builder().embedder(embedder);

    if cli.in_memory {
        builder = builder.vector_index(Arc::new(InMemoryVectorIndex::new()));
    } else {
        let api_key = std::env::var("PINECONE_API_KEY")
            .context("PINECONE_API_KEY is not set (use --in-memory for a local index)")?;
        let pinecone: Arc<dyn VectorIndex> = Arc::new(PineconeIndex::new(api_key)?);
        builder = builder
            .vector_index(Arc::new(RetryingVectorIndex::new(pinecone, config.retry)))
            .provision_lock(Arc::new(LockFile::new(std::env::temp_dir().join("vitt-locks"))));
    }

    let pipeline = builder.config(config).build().await?;
    if let Some(path) = &cli.load {
        let ids = pipeline.index_documents(read_documents(path, false)?).await?;
        info!(count = ids.len(), path = %path.display(), "preloaded documents");
    }
    Ok(pipeline)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one command to completion, printing its result as JSON on stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::from_env()?;
    let pipeline = pipeline(&cli, config).await?;

    match cli.command {
        Command::Index { file, records } => {
            let documents = read_documents(&file, records)?;
            if documents.is_empty() {
                bail!("{} contains no documents", file.display());
            }
            let ids = pipeline.index_documents(documents).await?;
            print_json(&serde_json::json!({ "indexed": ids }))
        }
        Command::Search { query, top_k } => {
            let results = pipeline.retrieve_relevant_documents(&query, top_k).await?;
            print_json(&results)
        }
        Command::Report { query, report_type, narrative, sections, top_k } => {
            let retry = pipeline.config().retry;
            let model = Arc::new(RetryingModel::new(Arc::new(GeminiModel::from_env()?), retry));

            let mut request = ReportRequest::new(query).with_report_type(report_type);
            if narrative {
                request = request.narrative();
            }
            if !sections.is_empty() {
                request = request.with_sections(sections);
            }
            if let Some(k) = top_k {
                request = request.with_top_k(k);
            }

            let synthesizer = ReportSynthesizer::new(Arc::new(pipeline), model);
            let report = synthesizer.generate_report(&request).await?;
            print_json(&report)
        }
    }
}
