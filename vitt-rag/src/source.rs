//! Typed records from upstream financial data sources.
//!
//! News, sentiment and stock APIs return payloads of varying shape.
//! [`SourceRecord`] names each known kind with explicit optional fields and
//! validates it at the boundary before it becomes a uniform [`Document`].
//!
//! ```json
//! {"kind": "news", "title": "Sensex hits record", "source_name": "Reuters"}
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::document::{DATE_KEY, Document, Metadata, SOURCE_KEY};
use crate::error::{RagError, Result};

const INDIAN_STOCK_API: &str = "Indian Stock API";

/// A general financial news article.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// Sentiment attached to a news article.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sentiment {
    pub polarity: Option<String>,
    pub score: Option<f64>,
}

/// A company mentioned by a news article.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// A news article with sentiment analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<String>,
    pub url: Option<String>,
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// A company snapshot from the stock data API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StockSnapshot {
    pub stock_name: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub company_description: Option<String>,
}

/// A forecast measure for one stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockForecast {
    pub stock_id: String,
    pub measure_code: String,
    #[serde(default = "default_period_type")]
    pub period_type: String,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default = "default_age")]
    pub age: String,
}

fn default_period_type() -> String {
    "Annual".to_string()
}

fn default_data_type() -> String {
    "Actuals".to_string()
}

fn default_age() -> String {
    "Current".to_string()
}

/// A news item from the Indian stock API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StockNewsArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub source: Option<String>,
    pub pub_date: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub stock_id: Option<String>,
    pub category: Option<String>,
}

/// Every upstream record kind the indexer understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    News(NewsArticle),
    SentimentNews(SentimentArticle),
    StockData(StockSnapshot),
    StockForecast(StockForecast),
    IndianStockNews(StockNewsArticle),
}

impl SourceRecord {
    /// The `type` metadata value recorded for this kind.
    pub fn doc_type(&self) -> &'static str {
        match self {
            SourceRecord::News(_) => "news",
            SourceRecord::SentimentNews(_) => "sentiment_news",
            SourceRecord::StockData(_) => "indian_stock_data",
            SourceRecord::StockForecast(_) => "stock_forecast",
            SourceRecord::IndianStockNews(_) => "indian_stock_news",
        }
    }

    /// Convert into a [`Document`] dated today (UTC).
    pub fn into_document(self) -> Result<Document> {
        self.into_document_on(Utc::now().date_naive())
    }

    /// Convert into a [`Document`], using `today` for kinds that carry no
    /// date of their own.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if the record yields no text or
    /// a required identifier is blank.
    pub fn into_document_on(self, today: NaiveDate) -> Result<Document> {
        let doc_type = self.doc_type();
        let today = today.format("%Y-%m-%d").to_string();
        let mut fields = Fields::new(doc_type);

        let (id, text) = match self {
            SourceRecord::News(a) => {
                let text = sentence_join(&[&a.title, &a.description, &a.content]);
                fields.put(SOURCE_KEY, a.source_name);
                fields.put("title", a.title);
                fields.put("author", a.author);
                fields.put(DATE_KEY, a.published_at.as_deref().map(date_part));
                fields.put("published_at", a.published_at);
                fields.put("url", a.url);
                fields.put("image_url", a.image_url);
                (format!("news_{}", Uuid::new_v4()), text)
            }
            SourceRecord::SentimentNews(a) => {
                let sentiment = a.sentiment.unwrap_or_default();
                let polarity = sentiment.polarity.clone().unwrap_or_else(|| "neutral".into());
                let score = sentiment.score.unwrap_or(0.0);
                let entities = a
                    .entities
                    .iter()
                    .filter_map(|e| {
                        e.name.as_ref().map(|name| {
                            format!("{name} ({})", e.symbol.as_deref().unwrap_or_default())
                        })
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let symbols = a
                    .entities
                    .iter()
                    .filter_map(|e| e.symbol.clone())
                    .collect::<Vec<_>>()
                    .join(",");
                let lead = sentence_join(&[&a.title, &a.description]);
                let text = format!(
                    "{lead}. Sentiment: {polarity} (score: {score}). Related entities: {entities}"
                );
                fields.put(SOURCE_KEY, a.source);
                fields.put("title", a.title);
                fields.put(DATE_KEY, a.published_at.as_deref().map(date_part));
                fields.put("published_at", a.published_at);
                fields.put("url", a.url);
                fields.put("sentiment_polarity", sentiment.polarity);
                fields.put("sentiment_score", sentiment.score);
                fields.put("entities", Some(symbols).filter(|s| !s.is_empty()));
                (format!("sentiment_news_{}", Uuid::new_v4()), text)
            }
            SourceRecord::StockData(s) => {
                let name = require("stock_name", s.stock_name)?;
                let company = s.company_name.as_deref().unwrap_or(&name);
                let industry = s.industry.as_deref().unwrap_or("N/A");
                let mut text = format!("Stock data for {company} in {industry} industry.");
                if let Some(description) = s.company_description.as_deref() {
                    text.push(' ');
                    text.push_str(description);
                }
                fields.put(SOURCE_KEY, Some(INDIAN_STOCK_API));
                fields.put(DATE_KEY, Some(today.as_str()));
                fields.put("stock_name", Some(name.as_str()));
                fields.put("company_name", s.company_name);
                fields.put("industry", s.industry);
                (format!("indian_stock_{name}_{today}_{}", Uuid::new_v4()), text)
            }
            SourceRecord::StockForecast(f) => {
                let stock_id = require("stock_id", f.stock_id)?;
                let measure = require("measure_code", f.measure_code)?;
                let text = format!(
                    "Forecast data for {stock_id} with measure {measure}, period type {}, data type {}, age {}.",
                    f.period_type, f.data_type, f.age
                );
                let id = format!(
                    "forecast_{stock_id}_{measure}_{}_{}_{}_{}",
                    f.period_type,
                    f.data_type,
                    f.age,
                    Uuid::new_v4()
                );
                fields.put(SOURCE_KEY, Some(INDIAN_STOCK_API));
                fields.put(DATE_KEY, Some(today.as_str()));
                fields.put("stock_id", Some(stock_id));
                fields.put("measure_code", Some(measure));
                fields.put("period_type", Some(f.period_type));
                fields.put("data_type", Some(f.data_type));
                fields.put("age", Some(f.age));
                (id, text)
            }
            SourceRecord::IndianStockNews(n) => {
                let text = sentence_join(&[&n.title, &n.summary]);
                let topics = n.topics.join(",");
                fields.put(SOURCE_KEY, Some(n.source.as_deref().unwrap_or(INDIAN_STOCK_API)));
                fields.put("title", n.title);
                fields.put(DATE_KEY, n.pub_date.as_deref().map(date_part));
                fields.put("published_at", n.pub_date);
                fields.put("url", n.url);
                fields.put("image_url", n.image_url);
                fields.put("stock_id", n.stock_id);
                fields.put("category", n.category);
                fields.put("topics", Some(topics).filter(|t| !t.is_empty()));
                (format!("indian_stock_news_{}", Uuid::new_v4()), text)
            }
        };

        if text.trim().trim_matches('.').trim().is_empty() {
            return Err(RagError::InvalidArgument(format!("{doc_type} record has no text")));
        }
        Ok(Document { id: Some(id), text, metadata: fields.into_inner() })
    }
}

impl TryFrom<SourceRecord> for Document {
    type Error = RagError;

    fn try_from(record: SourceRecord) -> Result<Self> {
        record.into_document()
    }
}

/// Metadata under construction; absent values are skipped rather than
/// stored as null.
struct Fields(Metadata);

impl Fields {
    fn new(doc_type: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), Value::String(doc_type.to_string()));
        Self(metadata)
    }

    fn put<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.0.insert(key.to_string(), value.into());
        }
    }

    fn into_inner(self) -> Metadata {
        self.0
    }
}

fn require(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(RagError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Join the present, non-empty parts with `". "`.
fn sentence_join(parts: &[&Option<String>]) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

/// The `YYYY-MM-DD` prefix of an RFC 3339 timestamp, or the input unchanged.
fn date_part(timestamp: &str) -> String {
    match timestamp.get(..10) {
        Some(prefix) if NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok() => prefix.to_string(),
        _ => timestamp.to_string(),
    }
}
