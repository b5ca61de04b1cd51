//! Stopword configuration.
//!
//! Stopword lists are JSON arrays of strings. A list that cannot be read is
//! not fatal: callers get an empty set and a warning in the log.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const ENGLISH: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves",
];

/// Built-in English stopword list.
pub fn english() -> HashSet<String> {
    ENGLISH.iter().map(|w| w.to_string()).collect()
}

pub fn load(path: &Path) -> Result<HashSet<String>> {
    let f = File::open(path).with_context(|| format!("open stopwords {}", path.display()))?;
    let words: Vec<String> = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse stopwords {}", path.display()))?;
    Ok(words.into_iter().collect())
}

/// Like [`load`], but degrades to an empty set on any failure.
pub fn load_or_empty(path: &Path) -> HashSet<String> {
    match load(path) {
        Ok(words) => {
            tracing::debug!(path = %path.display(), count = words.len(), "loaded stopwords");
            words
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "using an empty stopword list");
            HashSet::new()
        }
    }
}
