//! Positional TF-IDF inverted index.
//!
//! Every (term, document) pair owns one [`Posting`] holding the term
//! frequency ratio and the ascending token offsets, so a frequency without
//! positions cannot be recorded by [`TfIdfIndex::add_document`].

use crate::error::{IndexError, IndexResult};
use crate::query::QueryUnit;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

pub type Term = String;
pub type DocId = String;

/// A document after tokenization: terms in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedDocument {
    pub doc_id: DocId,
    pub terms: Vec<Term>,
}

impl TokenizedDocument {
    pub fn new(doc_id: impl Into<DocId>, terms: Vec<Term>) -> Self {
        Self { doc_id: doc_id.into(), terms }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub tf: f64, // occurrences / document length
    pub positions: Vec<usize>, // ascending
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f64,
}

/// A ranking strategy over an append-only document collection.
pub trait SearchIndex {
    fn add_document(&mut self, doc: &TokenizedDocument);

    /// Ranked matches, best first, ties broken by ascending document id.
    fn search_scored(&self, units: &[QueryUnit], limit: usize) -> Vec<ScoredDocument>;

    fn search(&self, units: &[QueryUnit], limit: usize) -> Vec<DocId> {
        self.search_scored(units, limit)
            .into_iter()
            .map(|hit| hit.doc_id)
            .collect()
    }

    fn total_documents(&self) -> u64;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfIdfIndex {
    document_frequency: HashMap<Term, u32>,
    postings: HashMap<Term, HashMap<DocId, Posting>>,
    total_documents: u64,
    /// Set when restored from a snapshot that carries no offsets.
    #[serde(default)]
    positions_missing: bool,
}

impl TfIdfIndex {
    pub fn new() -> Self { Self::default() }

    /// Rebuild an index from bare statistics. Offsets are unknown, so phrase
    /// units will not match until documents are re-added to a fresh index.
    pub(crate) fn from_statistics(
        document_frequency: HashMap<Term, u32>,
        term_frequency: HashMap<Term, HashMap<DocId, f64>>,
        total_documents: u64,
    ) -> Self {
        let postings = term_frequency
            .into_iter()
            .map(|(term, docs)| {
                let docs = docs
                    .into_iter()
                    .map(|(doc_id, tf)| (doc_id, Posting { tf, positions: Vec::new() }))
                    .collect();
                (term, docs)
            })
            .collect();
        Self { document_frequency, postings, total_documents, positions_missing: true }
    }

    pub fn add_document(&mut self, doc: &TokenizedDocument) {
        self.total_documents += 1;
        if doc.terms.is_empty() {
            tracing::debug!(doc_id = %doc.doc_id, "indexed empty document");
            return;
        }

        let len = doc.terms.len() as f64;
        let mut occurrences: HashMap<&str, Vec<usize>> = HashMap::new();
        for (pos, term) in doc.terms.iter().enumerate() {
            occurrences.entry(term.as_str()).or_default().push(pos);
        }

        let mut collided = false;
        for (term, positions) in occurrences {
            let tf = positions.len() as f64 / len;
            *self.document_frequency.entry(term.to_string()).or_insert(0) += 1;
            let docs = self.postings.entry(term.to_string()).or_default();
            match docs.entry(doc.doc_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Posting { tf, positions });
                }
                Entry::Occupied(mut slot) => {
                    collided = true;
                    let posting = slot.get_mut();
                    posting.tf = tf;
                    posting.positions.extend(positions);
                    posting.positions.sort_unstable();
                    posting.positions.dedup();
                }
            }
        }
        if collided {
            tracing::warn!(doc_id = %doc.doc_id, "document id indexed more than once; statistics double-counted");
        }
    }

    /// Number of documents containing `term`; 0 for unseen terms.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn term_frequency(&self, term: &str, doc_id: &str) -> f64 {
        self.posting(term, doc_id).map_or(0.0, |p| p.tf)
    }

    /// `ln(total_documents / document_frequency)`. Unseen terms are an error
    /// rather than a silent zero.
    pub fn inverse_document_frequency(&self, term: &str) -> IndexResult<f64> {
        match self.document_frequency.get(term) {
            Some(&df) if df > 0 => Ok((self.total_documents as f64 / df as f64).ln()),
            _ => Err(IndexError::UnseenTerm { term: term.to_string() }),
        }
    }

    pub fn tf_idf(&self, term: &str, doc_id: &str) -> IndexResult<f64> {
        Ok(self.term_frequency(term, doc_id) * self.inverse_document_frequency(term)?)
    }

    pub fn positions(&self, term: &str, doc_id: &str) -> Option<&[usize]> {
        self.posting(term, doc_id).map(|p| p.positions.as_slice())
    }

    pub fn total_documents(&self) -> u64 { self.total_documents }

    pub fn num_terms(&self) -> usize { self.document_frequency.len() }

    pub fn has_positions(&self) -> bool { !self.positions_missing }

    pub(crate) fn document_frequencies(&self) -> impl Iterator<Item = (&str, u32)> {
        self.document_frequency.iter().map(|(t, df)| (t.as_str(), *df))
    }

    pub(crate) fn posting_lists(&self) -> impl Iterator<Item = (&str, &HashMap<DocId, Posting>)> {
        self.postings.iter().map(|(t, docs)| (t.as_str(), docs))
    }

    fn posting(&self, term: &str, doc_id: &str) -> Option<&Posting> {
        self.postings.get(term)?.get(doc_id)
    }

    /// Adds the score of every document matching `terms` as a contiguous run.
    fn score_unit(&self, terms: &[Term], scores: &mut HashMap<DocId, f64>) {
        if terms.is_empty() {
            return;
        }
        let mut lists = Vec::with_capacity(terms.len());
        for term in terms {
            match self.postings.get(term) {
                Some(docs) => lists.push(docs),
                // an unseen term empties the candidate set
                None => return,
            }
        }
        if terms.len() > 1 && self.positions_missing {
            tracing::warn!(?terms, "phrase query against an index without positions; no matches");
            return;
        }
        let idfs = match terms
            .iter()
            .map(|t| self.inverse_document_frequency(t))
            .collect::<IndexResult<Vec<f64>>>()
        {
            Ok(idfs) => idfs,
            Err(err) => {
                tracing::warn!(%err, "posting list without document frequency");
                return;
            }
        };

        let Some(smallest) = lists.iter().min_by_key(|docs| docs.len()) else { return };
        for doc_id in smallest.keys() {
            let Some(postings) = lists
                .iter()
                .map(|docs| docs.get(doc_id))
                .collect::<Option<Vec<&Posting>>>()
            else {
                continue;
            };
            if !forms_phrase(&postings) {
                continue;
            }
            let score: f64 = postings.iter().zip(&idfs).map(|(p, idf)| p.tf * idf).sum();
            *scores.entry(doc_id.clone()).or_insert(0.0) += score;
        }
    }

    pub fn search_scored(&self, units: &[QueryUnit], limit: usize) -> Vec<ScoredDocument> {
        if limit == 0 || units.is_empty() {
            return Vec::new();
        }
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        for unit in units {
            self.score_unit(unit.terms(), &mut scores);
        }

        let mut ranked: Vec<ScoredDocument> = scores
            .into_iter()
            .map(|(doc_id, score)| ScoredDocument { doc_id, score })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
        ranked.truncate(limit);
        ranked
    }

    pub fn search(&self, units: &[QueryUnit], limit: usize) -> Vec<DocId> {
        SearchIndex::search(self, units, limit)
    }
}

impl SearchIndex for TfIdfIndex {
    fn add_document(&mut self, doc: &TokenizedDocument) {
        TfIdfIndex::add_document(self, doc)
    }

    fn search_scored(&self, units: &[QueryUnit], limit: usize) -> Vec<ScoredDocument> {
        TfIdfIndex::search_scored(self, units, limit)
    }

    fn total_documents(&self) -> u64 { self.total_documents }
}

/// True when some offset `p` of the first term has `p + i` in the i-th list.
fn forms_phrase(postings: &[&Posting]) -> bool {
    let Some((first, rest)) = postings.split_first() else { return false };
    if rest.is_empty() {
        return true;
    }
    first.positions.iter().any(|&start| {
        rest.iter()
            .enumerate()
            .all(|(i, p)| p.positions.binary_search(&(start + i + 1)).is_ok())
    })
}

/// An index behind a single read-write lock: writers are exclusive, searches
/// share the read side.
pub struct SharedIndex<I = TfIdfIndex> {
    inner: Arc<RwLock<I>>,
}

impl<I> Clone for SharedIndex<I> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<I: SearchIndex + Default> Default for SharedIndex<I> {
    fn default() -> Self { Self::new(I::default()) }
}

impl<I: SearchIndex> SharedIndex<I> {
    pub fn new(index: I) -> Self {
        Self { inner: Arc::new(RwLock::new(index)) }
    }

    pub fn add_document(&self, doc: &TokenizedDocument) {
        self.inner.write().add_document(doc);
    }

    pub fn add_documents<'a>(&self, docs: impl IntoIterator<Item = &'a TokenizedDocument>) -> usize {
        let mut guard = self.inner.write();
        let mut added = 0;
        for doc in docs {
            guard.add_document(doc);
            added += 1;
        }
        added
    }

    pub fn search(&self, units: &[QueryUnit], limit: usize) -> Vec<DocId> {
        self.inner.read().search(units, limit)
    }

    pub fn search_scored(&self, units: &[QueryUnit], limit: usize) -> Vec<ScoredDocument> {
        self.inner.read().search_scored(units, limit)
    }

    pub fn total_documents(&self) -> u64 {
        self.inner.read().total_documents()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, I> {
        self.inner.read()
    }
}
