use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Shortest token kept in the name and oracle term spaces.
pub const MIN_INDEXED_TOKEN_LEN: usize = 3;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &["a", "an", "the", "of", "and", "or", "to", "for", "in"];
        words.iter().copied().collect()
    };
}

/// Per-field term counts for a single card.
pub type TokenFrequency = HashMap<String, u16>;

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// NFKC-normalise and lower-case, keeping punctuation. Substring matching runs on this form.
pub fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase().trim().to_string()
}

/// Split into lower-cased alphanumeric runs, dropping stopwords. Separators like `—` or `//`
/// never become tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Tokens eligible for the name and oracle term spaces.
pub fn index_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_INDEXED_TOKEN_LEN)
        .collect()
}

pub fn frequencies<I>(tokens: I) -> TokenFrequency
where
    I: IntoIterator<Item = String>,
{
    let mut freq = TokenFrequency::new();
    for token in tokens {
        let count = freq.entry(token).or_insert(0);
        *count = count.saturating_add(1);
    }
    freq
}
