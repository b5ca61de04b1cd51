use crate::index::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exact-match lookup from document id to the original text.
pub trait DocumentStore {
    fn get(&self, doc_id: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDocumentStore {
    docs: HashMap<DocId, String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Returns the previous text if `doc_id` was already stored.
    pub fn insert(&mut self, doc_id: impl Into<DocId>, text: impl Into<String>) -> Option<String> {
        self.docs.insert(doc_id.into(), text.into())
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, doc_id: &str) -> Option<&str> {
        self.docs.get(doc_id).map(String::as_str)
    }
}

/// Renders ranked ids as `(<doc_id>) <text>` blocks, each followed by a blank
/// line. Ids missing from the store are skipped.
pub fn format_results<S: DocumentStore + ?Sized>(ids: &[DocId], store: &S) -> String {
    let mut out = String::new();
    for doc_id in ids {
        if let Some(text) = store.get(doc_id) {
            out.push_str(&format!("({doc_id}) {text}\n\n"));
        }
    }
    out
}
