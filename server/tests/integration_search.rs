use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use phrasedex_core::persist::{load_index, save_docs, save_index, save_meta, IndexPaths, MetaFile, FORMAT_VERSION};
use phrasedex_core::{MemoryDocumentStore, TfIdfIndex, Tokenizer};
use serde_json::Value;
use server::{router, AppState};
use std::collections::HashSet;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn build_tiny_index(dir: &Path) {
    let paths = IndexPaths::new(dir);
    let tokenizer = Tokenizer::default();
    let mut index = TfIdfIndex::new();
    let mut docs = MemoryDocumentStore::new();
    for (id, text) in [("0", "red is a color"), ("1", "red and blue"), ("2", "green and red colors")] {
        index.add_document(&tokenizer.tokenize_document(id, text));
        docs.insert(id, text);
    }
    save_index(&paths, &index).unwrap();
    save_docs(&paths, &docs).unwrap();
    let meta = MetaFile {
        num_docs: index.total_documents(),
        num_terms: index.num_terms(),
        created_at: "2024-01-01T00:00:00Z".into(),
        version: FORMAT_VERSION,
        tokenizer,
    };
    save_meta(&paths, &meta).unwrap();
}

fn app(dir: &Path) -> Router {
    let state = AppState::load(dir, HashSet::new(), Some(TOKEN.to_string())).unwrap();
    router(state)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn doc_ids(body: &Bytes) -> Vec<String> {
    let json: Value = serde_json::from_slice(body).unwrap();
    json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["doc_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/search?q=and&k=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc_ids(&body), vec!["1", "2"]);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"][0]["snippet"], "red <em>and</em> blue");
}

#[tokio::test]
async fn search_phrases_and_limit() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (_, body) = get(app(dir.path()), "/search?q=%22is%20a%20color%22").await;
    assert_eq!(doc_ids(&body), vec!["0"]);

    let (_, body) = get(app(dir.path()), "/search?q=%22blue%20and%20red%22").await;
    assert!(doc_ids(&body).is_empty());

    let (_, body) = get(app(dir.path()), "/search?q=red&k=1").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 3);
    assert_eq!(doc_ids(&body), vec!["0"]);
}

#[tokio::test]
async fn search_text_renders_blocks() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/search/text?q=colors%20%22Green%20and%20red%22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"(2) green and red colors\n\n");
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["text"], "red and blue");

    let (status, _) = get(app(dir.path()), "/doc/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_requires_token_then_appends() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());
    let payload = r#"[{"id": "3", "body": "Yellow and orange"}]"#;

    let req = Request::post("/index/batch")
        .header("content-type", "application/json")
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/index/batch")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["indexed"], 1);
    assert_eq!(json["total_documents"], 4);

    let (_, body) = get(app.clone(), "/search?q=%22yellow%20and%20orange%22").await;
    assert_eq!(doc_ids(&body), vec!["3"]);

    let req = Request::post("/index/commit")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    let reloaded = load_index(&IndexPaths::new(dir.path())).unwrap();
    assert_eq!(reloaded.total_documents(), 4);
}
