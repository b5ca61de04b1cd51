use phrasedex_core::stopwords;
use phrasedex_core::Tokenizer;
use std::collections::HashSet;

#[test]
fn it_normalizes_and_stems() {
    let words = Tokenizer::new(true, HashSet::new()).tokenize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // NFKC keeps the precomposed é
    assert!(words.iter().any(|w| w.starts_with("café")));
}

#[test]
fn it_filters_stopwords() {
    let words = Tokenizer::new(false, stopwords::english()).tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn it_builds_tokenized_documents() {
    let doc = Tokenizer::default().tokenize_document("2", "Green and RED colors");
    assert_eq!(doc.doc_id, "2");
    assert_eq!(doc.terms, vec!["green", "and", "red", "colors"]);
}

#[test]
fn it_normalizes_compatibility_forms() {
    // full-width letters fold to ASCII under NFKC
    let words = Tokenizer::default().tokenize("ＲＵＳＴ");
    assert_eq!(words, vec!["rust"]);
}
