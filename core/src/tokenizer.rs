use crate::index::TokenizedDocument;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Splits raw text into index terms: NFKC normalization, lowercase, optional
/// stopword removal and optional English stemming.
///
/// Positions are implicit: the i-th returned term sits at offset i, counted
/// after stopwords are dropped, so phrase queries see stopword-free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tokenizer {
    pub stem: bool,
    #[serde(default)]
    pub stopwords: HashSet<String>,
}

impl Tokenizer {
    pub fn new(stem: bool, stopwords: HashSet<String>) -> Self {
        Self { stem, stopwords }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if self.stopwords.contains(token) { continue; }
            if self.stem {
                tokens.push(STEMMER.stem(token).to_string());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    pub fn tokenize_document(&self, doc_id: impl Into<String>, text: &str) -> TokenizedDocument {
        TokenizedDocument::new(doc_id, self.tokenize(text))
    }
}
