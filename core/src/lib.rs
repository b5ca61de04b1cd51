//! Positional TF-IDF search: an append-only inverted index with phrase
//! matching, a query parser and result formatting.

pub mod error;
pub mod format;
pub mod index;
pub mod persist;
pub mod query;
pub mod stopwords;
pub mod tokenizer;

pub use error::{IndexError, IndexResult};
pub use format::{format_results, DocumentStore, MemoryDocumentStore};
pub use index::{DocId, Posting, ScoredDocument, SearchIndex, SharedIndex, Term, TfIdfIndex, TokenizedDocument};
pub use query::{QueryParser, QueryUnit};
pub use tokenizer::Tokenizer;
