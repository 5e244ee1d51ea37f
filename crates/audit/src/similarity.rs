//! Name similarity scoring. Pure: two names in, a score in [0, 100] out.
//!
//! Thresholds and clustering live elsewhere; nothing here knows about items.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Character similarity of the normalized names, order-sensitive.
    Ratio,
    /// Tokens sorted before comparing, so word order does not matter.
    TokenSort,
    /// Shared tokens compared against each side's remainder. A name whose
    /// tokens are a subset of the other's scores 100.
    TokenSet,
}

/// Lowercase, punctuation to spaces, collapse whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized Levenshtein similarity scaled to [0, 100].
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = join(left.intersection(&right).copied());
    let left_rest = join(left.difference(&right).copied());
    let right_rest = join(right.difference(&left).copied());

    let with_left = join_nonempty(&shared, &left_rest);
    let with_right = join_nonempty(&shared, &right_rest);

    let mut best = ratio(&with_left, &with_right);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &with_left))
            .max(ratio(&shared, &with_right));
    }
    best
}

/// Score two raw names with the given scorer. Names are normalized first.
pub fn score(a: &str, b: &str, scorer: Scorer) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let raw = match scorer {
        Scorer::Ratio => ratio(&a, &b),
        Scorer::TokenSort => token_sort_ratio(&a, &b),
        Scorer::TokenSet => token_set_ratio(&a, &b),
    };
    round2(raw)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(" ")
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
