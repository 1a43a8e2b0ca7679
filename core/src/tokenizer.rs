use crate::ports::Normalizer;
use crate::{Error, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Longest phrase, in bytes, the normalizer accepts.
pub const MAX_PHRASE_LEN: usize = 20_000;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","will","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into stems using NFKC normalization, lowercase, stopword removal, and stemming.
/// Each stem appears once, in order of first occurrence.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        let stem = STEMMER.stem(token).to_string();
        if stem.is_empty() { continue; }
        if seen.insert(stem.clone()) {
            tokens.push(stem);
        }
    }
    tokens
}

/// In-process normalizer backed by [`tokenize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StemNormalizer;

#[async_trait]
impl Normalizer for StemNormalizer {
    async fn normalize(&self, phrase: &str) -> Result<Vec<String>> {
        if phrase.len() > MAX_PHRASE_LEN {
            tracing::debug!(len = phrase.len(), max = MAX_PHRASE_LEN, "phrase too large");
            return Err(Error::TooLarge { len: phrase.len(), max: MAX_PHRASE_LEN });
        }
        Ok(tokenize(phrase))
    }
}
