use crate::error::{IndexError, IndexResult};
use crate::format::MemoryDocumentStore;
use crate::index::{DocId, Term, TfIdfIndex};
use crate::tokenizer::Tokenizer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
    /// How documents were tokenized; queries must be normalized the same way.
    #[serde(default)]
    pub tokenizer: Tokenizer,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn snapshot(&self) -> PathBuf { self.root.join("snapshot.jsonl") }
}

/// Full binary snapshot, positions included.
pub fn save_index(paths: &IndexPaths, index: &TfIdfIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.index())?;
    let bytes = bincode::serialize(index)?;
    f.write_all(&bytes)?;
    tracing::debug!(bytes = bytes.len(), path = %paths.index().display(), "saved index");
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<TfIdfIndex> {
    let mut f = File::open(paths.index())
        .with_context(|| format!("open {}", paths.index().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index = bincode::deserialize(&buf)?;
    Ok(index)
}

pub fn save_docs(paths: &IndexPaths, docs: &MemoryDocumentStore) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<MemoryDocumentStore> {
    let mut f = File::open(paths.docs())
        .with_context(|| format!("open {}", paths.docs().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf)?;
    Ok(docs)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())
        .with_context(|| format!("open {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load everything a query needs: the index, the stored texts and the metadata.
pub fn load_index_dir(paths: &IndexPaths) -> Result<(TfIdfIndex, MemoryDocumentStore, MetaFile)> {
    let index = load_index(paths)?;
    let docs = load_docs(paths)?;
    let meta = load_meta(paths)?;
    Ok((index, docs, meta))
}

// --- JSONL snapshot ---
//
// Line 1:   {"__metadata__": {"doc_counts": [{"term", "count"}], "total_documents": N}}
// Line 2..: {"term": t, "postings": [{"doc_id": d, "tf_score": f}]}
//
// Older files label the term "doc_id", the postings "term_tf_scores" and the
// document id "term"; both spellings are read.

#[derive(Serialize, Deserialize)]
struct MetadataLine {
    #[serde(rename = "__metadata__")]
    metadata: SnapshotMetadata,
}

#[derive(Serialize, Deserialize)]
struct SnapshotMetadata {
    doc_counts: Vec<DocCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_documents: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct DocCount {
    term: Term,
    count: u32,
}

#[derive(Serialize, Deserialize)]
struct PostingLine {
    #[serde(alias = "doc_id")]
    term: Term,
    #[serde(alias = "term_tf_scores")]
    postings: Vec<TfEntry>,
}

#[derive(Serialize, Deserialize)]
struct TfEntry {
    #[serde(alias = "term")]
    doc_id: DocId,
    tf_score: f64,
}

/// Writes term statistics as JSON lines. Positions are not part of this format.
pub fn write_jsonl_snapshot<W: Write>(index: &TfIdfIndex, writer: W) -> IndexResult<()> {
    let mut out = BufWriter::new(writer);

    let mut doc_counts: Vec<DocCount> = index
        .document_frequencies()
        .map(|(term, count)| DocCount { term: term.to_string(), count })
        .collect();
    doc_counts.sort_by(|a, b| a.term.cmp(&b.term));
    let header = MetadataLine {
        metadata: SnapshotMetadata { doc_counts, total_documents: Some(index.total_documents()) },
    };
    serde_json::to_writer(&mut out, &header).map_err(std::io::Error::from)?;
    out.write_all(b"\n")?;

    let mut lists: Vec<_> = index.posting_lists().collect();
    lists.sort_by(|a, b| a.0.cmp(b.0));
    for (term, docs) in lists {
        let mut postings: Vec<TfEntry> = docs
            .iter()
            .map(|(doc_id, p)| TfEntry { doc_id: doc_id.clone(), tf_score: p.tf })
            .collect();
        postings.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        let line = PostingLine { term: term.to_string(), postings };
        serde_json::to_writer(&mut out, &line).map_err(std::io::Error::from)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Rebuilds document frequencies, term frequencies and the document count.
/// The result has no positions; see [`TfIdfIndex::has_positions`].
pub fn read_jsonl_snapshot<R: BufRead>(reader: R) -> IndexResult<TfIdfIndex> {
    let mut metadata: Option<SnapshotMetadata> = None;
    let mut term_frequency: HashMap<Term, HashMap<DocId, f64>> = HashMap::new();
    let mut seen_docs: HashSet<DocId> = HashSet::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let line_no = i + 1;
        if metadata.is_none() {
            let header: MetadataLine = serde_json::from_str(&line)
                .map_err(|source| IndexError::MalformedSnapshot { line: line_no, source })?;
            metadata = Some(header.metadata);
            continue;
        }
        let entry: PostingLine = serde_json::from_str(&line)
            .map_err(|source| IndexError::MalformedSnapshot { line: line_no, source })?;
        let docs = term_frequency.entry(entry.term).or_default();
        for tf in entry.postings {
            seen_docs.insert(tf.doc_id.clone());
            docs.insert(tf.doc_id, tf.tf_score);
        }
    }

    let metadata = metadata.ok_or(IndexError::MissingMetadata)?;
    let document_frequency: HashMap<Term, u32> = metadata
        .doc_counts
        .into_iter()
        .filter(|dc| dc.count > 0)
        .map(|dc| (dc.term, dc.count))
        .collect();
    let total_documents = metadata.total_documents.unwrap_or(seen_docs.len() as u64);
    tracing::debug!(terms = document_frequency.len(), total_documents, "read jsonl snapshot");
    Ok(TfIdfIndex::from_statistics(document_frequency, term_frequency, total_documents))
}

pub fn export_snapshot(paths: &IndexPaths, index: &TfIdfIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = File::create(paths.snapshot())?;
    write_jsonl_snapshot(index, f)?;
    Ok(())
}

pub fn import_snapshot(path: &Path) -> Result<TfIdfIndex> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(read_jsonl_snapshot(BufReader::new(f))?)
}
