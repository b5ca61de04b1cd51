use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use phrasedex_core::persist::{load_index_dir, save_docs, save_index, save_meta, IndexPaths, MetaFile, FORMAT_VERSION};
use phrasedex_core::{format_results, DocumentStore, MemoryDocumentStore, QueryParser, SharedIndex, TokenizedDocument, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchDoc {
    #[serde(alias = "doc_id")]
    pub id: String,
    #[serde(alias = "text")]
    pub body: String,
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub index: SharedIndex,
    pub docs: Arc<RwLock<MemoryDocumentStore>>,
    pub tokenizer: Arc<Tokenizer>,
    pub parser: Arc<QueryParser>,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Load a built index directory. Queries are normalized with the tokenizer
    /// recorded at build time, minus `query_stopwords`.
    pub fn load(index_dir: impl Into<PathBuf>, query_stopwords: HashSet<String>, admin_token: Option<String>) -> Result<Self> {
        let index_root = index_dir.into();
        let (index, docs, meta) = load_index_dir(&IndexPaths::new(&index_root))?;
        tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, created_at = %meta.created_at, "index loaded");
        let parser = QueryParser::new()
            .with_normalizer(meta.tokenizer.clone())
            .with_stopwords(query_stopwords);
        Ok(Self {
            index_root,
            index: SharedIndex::new(index),
            docs: Arc::new(RwLock::new(docs)),
            tokenizer: Arc::new(meta.tokenizer),
            parser: Arc::new(parser),
            admin_token,
        })
    }
}

pub fn build_app(index_dir: String, query_stopwords: HashSet<String>) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::load(index_dir, query_stopwords, admin_token)?;

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Ok(router(state).layer(cors).layer(TraceLayer::new_for_http()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/search/text", get(search_text_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(state)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let units = state.parser.parse(&params.q);
    // Edge case: nothing searchable after parsing
    if units.is_empty() {
        let elapsed = start.elapsed();
        return Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits: 0, results: vec![] });
    }

    let mut scored = state.index.search_scored(&units, usize::MAX);
    let total_hits = scored.len();
    scored.truncate(params.k.min(MAX_K));

    let terms: Vec<&str> = units.iter().flat_map(|u| u.terms()).map(String::as_str).collect();
    let pattern = term_pattern(&terms);
    let docs = state.docs.read();
    let results: Vec<SearchHit> = scored
        .into_iter()
        .filter_map(|hit| {
            let text = docs.get(&hit.doc_id)?;
            Some(SearchHit { snippet: snippet(text, pattern.as_ref()), doc_id: hit.doc_id, score: hit.score })
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_ms = elapsed.as_millis() as u64, "search");
    Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits, results })
}

/// Plain-text rendering: `(<doc_id>) <text>` blocks separated by blank lines.
pub async fn search_text_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> String {
    let units = state.parser.parse(&params.q);
    let ids = state.index.search(&units, params.k.min(MAX_K));
    let docs = state.docs.read();
    format_results(&ids, &*docs)
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let docs = state.docs.read();
    match docs.get(&doc_id) {
        Some(text) => Ok(Json(serde_json::json!({ "doc_id": doc_id, "text": text }))),
        None => Err((StatusCode::NOT_FOUND, format!("document '{doc_id}' not found"))),
    }
}

fn snippet(text: &str, pattern: Option<&regex::Regex>) -> Option<String> {
    if text.is_empty() { return None; }
    let snippet = match pattern.and_then(|p| p.find(text)) {
        Some(m) => {
            let start = floor_boundary(text, m.start().saturating_sub(SNIPPET_BEFORE));
            let end = ceil_boundary(text, (m.start() + SNIPPET_AFTER).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(SNIPPET_AFTER).collect(),
    };
    Some(match pattern {
        Some(pat) => pat.replace_all(&snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string(),
        None => snippet,
    })
}

/// Case-insensitive alternation of whole-word query terms.
fn term_pattern(terms: &[&str]) -> Option<regex::Regex> {
    let alternatives: Vec<String> = terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| regex::escape(t))
        .collect();
    if alternatives.is_empty() { return None; }
    regex::RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .ok()
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) { idx -= 1; }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) { idx += 1; }
    idx
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(batch): Json<Vec<BatchDoc>>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let tokenized: Vec<TokenizedDocument> = batch
        .iter()
        .map(|doc| state.tokenizer.tokenize_document(doc.id.clone(), &doc.body))
        .collect();
    let indexed = state.index.add_documents(&tokenized);
    {
        let mut docs = state.docs.write();
        for doc in batch {
            if docs.insert(doc.id.clone(), doc.body).is_some() {
                tracing::warn!(doc_id = %doc.id, "document id re-indexed");
            }
        }
    }
    let total_documents = state.index.total_documents();
    tracing::info!(indexed, total_documents, "batch indexed");
    Ok(Json(serde_json::json!({ "indexed": indexed, "total_documents": total_documents })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let meta = persist(&state).map_err(|err| {
        tracing::error!(error = %format!("{err:#}"), "commit failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("commit failed: {err}"))
    })?;
    Ok(Json(serde_json::json!({ "num_docs": meta.num_docs, "num_terms": meta.num_terms, "created_at": meta.created_at })))
}

fn persist(state: &AppState) -> Result<MetaFile> {
    let paths = IndexPaths::new(&state.index_root);
    let meta = {
        let index = state.index.read();
        save_index(&paths, &index)?;
        MetaFile {
            num_docs: index.total_documents(),
            num_terms: index.num_terms(),
            created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
            version: FORMAT_VERSION,
            tokenizer: (*state.tokenizer).clone(),
        }
    };
    save_docs(&paths, &state.docs.read())?;
    save_meta(&paths, &meta)?;
    tracing::info!(root = %state.index_root.display(), num_docs = meta.num_docs, "index committed");
    Ok(meta)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
