use anyhow::Result;
use clap::{Parser, Subcommand};
use phrasedex_core::persist::{
    export_snapshot, load_index, load_index_dir, save_docs, save_index, save_meta, write_jsonl_snapshot,
    IndexPaths, MetaFile, FORMAT_VERSION,
};
use phrasedex_core::{format_results, stopwords, MemoryDocumentStore, QueryParser, TfIdfIndex, Tokenizer};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(alias = "doc_id")]
    id: RawId,
    #[serde(alias = "text")]
    body: String,
}

/// Corpora use both `"id": "7"` and `"id": 7`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a positional TF-IDF index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Apply English stemming to documents and queries
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// JSON array of stopwords removed at index time
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// Also remove the built-in English stopword list
        #[arg(long, default_value_t = false)]
        english_stopwords: bool,
    },
    /// Run a query against a built index and print the matching documents
    Search {
        /// Index directory
        #[arg(long)]
        index: String,
        /// Query string; wrap phrases in double quotes
        #[arg(long, short)]
        query: String,
        /// Maximum number of results
        #[arg(short, default_value_t = 10)]
        k: usize,
        /// JSON array of extra stopwords removed from the query
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
    /// Write the JSONL term-statistics snapshot of a built index
    Export {
        /// Index directory
        #[arg(long)]
        index: String,
        /// Output file
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stem, stopwords: stopword_file, english_stopwords } => {
            let mut words = stopword_file.as_deref().map(stopwords::load_or_empty).unwrap_or_default();
            if english_stopwords {
                words.extend(stopwords::english());
            }
            build_index(Path::new(&input), Path::new(&output), Tokenizer::new(stem, words)).map(|_| ())
        }
        Commands::Search { index, query, k, stopwords: stopword_file } => {
            let extra = stopword_file.as_deref().map(stopwords::load_or_empty).unwrap_or_default();
            let out = search_index(Path::new(&index), &query, k, extra)?;
            print!("{out}");
            Ok(())
        }
        Commands::Export { index, output } => {
            let idx = load_index(&IndexPaths::new(&index))?;
            write_jsonl_snapshot(&idx, File::create(&output)?)?;
            tracing::info!(output = %output.display(), terms = idx.num_terms(), "snapshot exported");
            Ok(())
        }
    }
}

fn build_index(input_path: &Path, output: &Path, tokenizer: Tokenizer) -> Result<MetaFile> {
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(&out_paths.root)?;

    let mut index = TfIdfIndex::new();
    let mut docs = MemoryDocumentStore::new();

    for file in input_files(input_path) {
        for doc in read_documents(&file)? {
            let doc_id = doc.id.into_string();
            index.add_document(&tokenizer.tokenize_document(doc_id.clone(), &doc.body));
            if docs.insert(doc_id.clone(), doc.body).is_some() {
                tracing::warn!(%doc_id, file = %file.display(), "duplicate document id; stored text replaced");
            }
        }
    }
    tracing::info!(num_docs = index.total_documents(), num_terms = index.num_terms(), "ingested documents");

    save_index(&out_paths, &index)?;
    save_docs(&out_paths, &docs)?;
    export_snapshot(&out_paths, &index)?;
    let meta = MetaFile {
        num_docs: index.total_documents(),
        num_terms: index.num_terms(),
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
        tokenizer,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output = %output.display(), "index build complete");
    Ok(meta)
}

fn search_index(dir: &Path, query: &str, k: usize, extra_stopwords: HashSet<String>) -> Result<String> {
    let (index, docs, meta) = load_index_dir(&IndexPaths::new(dir))?;
    let parser = QueryParser::new()
        .with_normalizer(meta.tokenizer)
        .with_stopwords(extra_stopwords);
    let units = parser.parse(query);
    if units.is_empty() {
        tracing::info!(query, "query has no searchable terms");
    }
    let ids = index.search(&units, k);
    tracing::debug!(query, hits = ids.len(), "search complete");
    Ok(format_results(&ids, &docs))
}

fn input_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        tracing::warn!(input = %input_path.display(), "input path does not exist");
    }
    files
}

fn read_documents(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => {
            tracing::warn!(file = %file.display(), "skipping file without a document object or array");
            Ok(Vec::new())
        }
    }
}
