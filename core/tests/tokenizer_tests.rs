use search_core::ports::Normalizer;
use search_core::tokenizer::{tokenize, StemNormalizer};
use search_core::Error;

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear once
    assert_eq!(words.iter().filter(|w| *w == "run").count(), 1);
    // Unicode normalization keeps the accented letter inside the word
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazi", "dog"]);
}

#[test]
fn only_stopwords_yield_nothing() {
    assert!(tokenize("and the of").is_empty());
}

#[tokio::test]
async fn normalizer_rejects_huge_phrase_as_client_error() {
    let phrase = "word ".repeat(5_000);
    match StemNormalizer.normalize(&phrase).await {
        Err(err @ Error::TooLarge { .. }) => assert!(err.is_client_error()),
        other => panic!("expected TooLarge, got {other:?}"),
    }
}
