//! Query parsing: bare terms and double-quoted phrases.
//!
//! `colors "green and red"` parses to `[Term(colors), Phrase(green, and, red)]`.
//! Every unit found is returned, in query order.

use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryUnit {
    Term(String),
    Phrase(Vec<String>),
}

impl QueryUnit {
    pub fn terms(&self) -> &[String] {
        match self {
            QueryUnit::Term(term) => std::slice::from_ref(term),
            QueryUnit::Phrase(terms) => terms,
        }
    }

    fn from_terms(mut terms: Vec<String>) -> Option<Self> {
        match terms.len() {
            0 => None,
            1 => terms.pop().map(QueryUnit::Term),
            _ => Some(QueryUnit::Phrase(terms)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    stopwords: HashSet<String>,
    normalizer: Option<Tokenizer>,
}

impl QueryParser {
    pub fn new() -> Self { Self::default() }

    /// Terms in `stopwords` are dropped from every unit.
    pub fn with_stopwords(mut self, stopwords: HashSet<String>) -> Self {
        self.stopwords = stopwords;
        self
    }

    /// Normalize each query token the same way documents were tokenized.
    pub fn with_normalizer(mut self, tokenizer: Tokenizer) -> Self {
        self.normalizer = Some(tokenizer);
        self
    }

    pub fn parse(&self, raw: &str) -> Vec<QueryUnit> {
        let mut units = Vec::new();
        let mut phrase: Option<Vec<String>> = None;

        for token in raw.split_whitespace() {
            let opens = token.starts_with('"');
            let closes = (token.len() > 1 && token.ends_with('"')) || (token == "\"" && phrase.is_some());
            let word = token.trim_matches('"');

            if opens && phrase.is_some() {
                // a new opening quote ends the phrase still open
                self.push_unit(&mut units, phrase.take().unwrap_or_default());
            }

            match (opens, closes) {
                (true, false) => {
                    let mut terms = Vec::new();
                    self.push_term(&mut terms, word);
                    phrase = Some(terms);
                }
                (_, true) => {
                    let mut terms = phrase.take().unwrap_or_default();
                    self.push_term(&mut terms, word);
                    self.push_unit(&mut units, terms);
                }
                (false, false) => match phrase.as_mut() {
                    Some(terms) => self.push_term(terms, word),
                    None => {
                        let mut terms = Vec::new();
                        self.push_term(&mut terms, word);
                        self.push_unit(&mut units, terms);
                    }
                },
            }
        }

        if let Some(terms) = phrase {
            tracing::debug!(raw, "unterminated phrase in query");
            self.push_unit(&mut units, terms);
        }
        units
    }

    fn push_term(&self, terms: &mut Vec<String>, word: &str) {
        if word.is_empty() {
            return;
        }
        match &self.normalizer {
            // one raw token may split into several terms, e.g. "state-of-the-art"
            Some(tokenizer) => terms.extend(
                tokenizer
                    .tokenize(word)
                    .into_iter()
                    .filter(|t| !self.stopwords.contains(t)),
            ),
            None if self.stopwords.contains(word) => {}
            None => terms.push(word.to_string()),
        }
    }

    fn push_unit(&self, units: &mut Vec<QueryUnit>, terms: Vec<String>) {
        if let Some(unit) = QueryUnit::from_terms(terms) {
            units.push(unit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str) -> QueryUnit { QueryUnit::Term(t.to_string()) }

    fn phrase(words: &[&str]) -> QueryUnit {
        QueryUnit::Phrase(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn bare_terms() {
        let units = QueryParser::new().parse("red  blue\tgreen");
        assert_eq!(units, vec![term("red"), term("blue"), term("green")]);
    }

    #[test]
    fn single_quoted_word_is_a_term() {
        assert_eq!(QueryParser::new().parse("\"and\""), vec![term("and")]);
    }

    #[test]
    fn keeps_every_unit() {
        let units = QueryParser::new().parse("colors \"green and red\" shade \"red is\"");
        assert_eq!(
            units,
            vec![term("colors"), phrase(&["green", "and", "red"]), term("shade"), phrase(&["red", "is"])]
        );
    }

    #[test]
    fn closing_quote_without_open_phrase() {
        assert_eq!(QueryParser::new().parse("blue red\""), vec![term("blue"), term("red")]);
    }

    #[test]
    fn reopening_closes_previous_phrase() {
        let units = QueryParser::new().parse("\"a b \"c d\"");
        assert_eq!(units, vec![phrase(&["a", "b"]), phrase(&["c", "d"])]);
    }

    #[test]
    fn reopening_with_single_quoted_word() {
        let units = QueryParser::new().parse("\"a b \"c\"");
        assert_eq!(units, vec![phrase(&["a", "b"]), term("c")]);
    }

    #[test]
    fn unterminated_phrase_is_kept() {
        assert_eq!(QueryParser::new().parse("\"is a color"), vec![phrase(&["is", "a", "color"])]);
    }

    #[test]
    fn lone_quotes_toggle_phrase() {
        let units = QueryParser::new().parse("\" red is \"");
        assert_eq!(units, vec![phrase(&["red", "is"])]);
    }

    #[test]
    fn empty_query() {
        assert!(QueryParser::new().parse("   ").is_empty());
        assert!(QueryParser::new().parse("\"\"").is_empty());
    }

    #[test]
    fn stopwords_are_removed() {
        let stop: HashSet<String> = ["a", "is"].iter().map(|s| s.to_string()).collect();
        let parser = QueryParser::new().with_stopwords(stop);
        assert_eq!(parser.parse("\"is a color\" a"), vec![term("color")]);
    }

    #[test]
    fn normalizer_lowercases_terms() {
        let parser = QueryParser::new().with_normalizer(Tokenizer::default());
        assert_eq!(parser.parse("\"Green AND\" Red,"), vec![phrase(&["green", "and"]), term("red")]);
    }

    #[test]
    fn hyphenated_token_becomes_phrase() {
        let parser = QueryParser::new().with_normalizer(Tokenizer::default());
        assert_eq!(parser.parse("red-blue"), vec![phrase(&["red", "blue"])]);
    }
}
