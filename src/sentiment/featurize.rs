//! Text featurization: word uni/bigrams plus character trigrams.
//!
//! The vocabulary is fitted on training text only. Each n-gram family is
//! term-frequency weighted and L2-normalized independently, then the two
//! families are concatenated into one sparse vector (words first).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

const TEXT_START: char = '\u{2}';
const TEXT_END: char = '\u{3}';
const CHAR_GRAM: usize = 3;

/// Sparse feature vector. `indices` is strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Value at `feature`, zero if absent.
    pub fn get(&self, feature: u32) -> f32 {
        match self.indices.binary_search(&feature) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Fitted n-gram vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextFeaturizer {
    word_vocab: BTreeMap<String, u32>,
    char_vocab: BTreeMap<String, u32>,
}

impl TextFeaturizer {
    /// Build the vocabulary from training texts. Indices are assigned in
    /// lexical order so the same corpus always yields the same layout.
    pub fn fit<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut words = BTreeSet::new();
        let mut chars = BTreeSet::new();
        for text in texts {
            let tokens = tokenize(text);
            words.extend(word_ngrams(&tokens));
            chars.extend(char_ngrams(&tokens));
        }

        let word_vocab: BTreeMap<String, u32> = words
            .into_iter()
            .enumerate()
            .map(|(i, gram)| (gram, i as u32))
            .collect();
        let offset = word_vocab.len() as u32;
        let char_vocab = chars
            .into_iter()
            .enumerate()
            .map(|(i, gram)| (gram, offset + i as u32))
            .collect();

        Self {
            word_vocab,
            char_vocab,
        }
    }

    /// Total number of feature slots.
    pub fn dimension(&self) -> usize {
        self.word_vocab.len() + self.char_vocab.len()
    }

    /// Featurize one text. N-grams outside the vocabulary are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        let mut words = count_known(word_ngrams(&tokens), &self.word_vocab);
        let mut chars = count_known(char_ngrams(&tokens), &self.char_vocab);
        l2_normalize(&mut words);
        l2_normalize(&mut chars);

        // Word indices all precede char indices, so concatenation stays sorted.
        let mut out = SparseVector::default();
        for (index, value) in words.into_iter().chain(chars) {
            out.indices.push(index);
            out.values.push(value);
        }
        out
    }
}

/// Lowercase, map everything except letters and digits to whitespace, split.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    normalized.split_whitespace().map(str::to_string).collect()
}

fn word_ngrams(tokens: &[String]) -> Vec<String> {
    let mut grams: Vec<String> = tokens.to_vec();
    grams.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    grams
}

fn char_ngrams(tokens: &[String]) -> Vec<String> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut text = String::new();
    text.push(TEXT_START);
    text.push_str(&tokens.join(" "));
    text.push(TEXT_END);

    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(CHAR_GRAM)
        .map(|w| w.iter().collect())
        .collect()
}

fn count_known(grams: Vec<String>, vocab: &BTreeMap<String, u32>) -> BTreeMap<u32, f32> {
    let mut counts = BTreeMap::new();
    for gram in grams {
        if let Some(&index) = vocab.get(&gram) {
            *counts.entry(index).or_insert(0.0) += 1.0;
        }
    }
    counts
}

fn l2_normalize(counts: &mut BTreeMap<u32, f32>) {
    let norm = counts.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in counts.values_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("Wow... Loved THIS place!"),
            vec!["wow", "loved", "this", "place"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn word_ngrams_include_bigrams() {
        let tokens = tokenize("not good at all");
        let grams = word_ngrams(&tokens);
        assert!(grams.contains(&"not good".to_string()));
        assert!(grams.contains(&"all".to_string()));
        assert_eq!(grams.len(), 4 + 3);
    }

    #[test]
    fn char_ngrams_carry_boundary_markers() {
        let grams = char_ngrams(&tokenize("ok"));
        assert_eq!(grams, vec!["\u{2}ok".to_string(), "ok\u{3}".to_string()]);
    }

    #[test]
    fn transform_is_sorted_and_normalized_per_family() {
        let featurizer = TextFeaturizer::fit(["good food", "bad food"]);
        let v = featurizer.transform("good good food");
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));

        let words = featurizer.word_vocab.len() as u32;
        let word_norm: f32 = v
            .iter()
            .filter(|(i, _)| *i < words)
            .map(|(_, x)| x * x)
            .sum();
        let char_norm: f32 = v
            .iter()
            .filter(|(i, _)| *i >= words)
            .map(|(_, x)| x * x)
            .sum();
        assert!((word_norm - 1.0).abs() < 1e-5);
        assert!((char_norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unseen_terms_are_ignored() {
        let featurizer = TextFeaturizer::fit(["tasty"]);
        let v = featurizer.transform("zzz qqq");
        assert_eq!(v.nnz(), 0);
    }

    #[test]
    fn fit_is_order_independent() {
        let a = TextFeaturizer::fit(["great pizza", "slow service"]);
        let b = TextFeaturizer::fit(["slow service", "great pizza"]);
        assert_eq!(a.transform("great service"), b.transform("great service"));
        assert_eq!(a.dimension(), b.dimension());
    }

    #[test]
    fn get_returns_zero_for_missing_feature() {
        let featurizer = TextFeaturizer::fit(["fine"]);
        let v = featurizer.transform("fine");
        assert!(v.get(v.indices[0]) > 0.0);
        assert_eq!(v.get(u32::MAX), 0.0);
    }
}
