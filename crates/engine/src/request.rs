//! Read-only views of the request text exposed to plans.

use planledger_inventory::contains_word;

/// How far back from a keyword a quantity may appear
/// ("3 pairs of classic" is three words back).
const LOOKBACK: usize = 4;

/// Words that end the search for a quantity, so "2 aviator and classic" does
/// not give `classic` a quantity of 2.
const BOUNDARIES: &[&str] = &["and", "plus", "with", "or", "then"];

const NUMBER_WORDS: &[(&str, i64)] = &[
    ("a", 1),
    ("an", 1),
    ("one", 1),
    ("single", 1),
    ("two", 2),
    ("pair", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

/// Whole-word, case-insensitive search in the request.
pub fn mentions(request: &str, word: &str) -> bool {
    contains_word(request, word)
}

/// Quantity written just before `keyword` in the request.
///
/// Digits and number words both count. "pair" is only a quantity on its own
/// ("a pair of" reads as one, not two), so number words win over it when both
/// appear. Plural keywords match ("aviators" for `aviator`).
pub fn quantity_for(request: &str, keyword: &str) -> Option<i64> {
    let tokens = tokens(request);
    let needle = tokens_of(keyword);
    if needle.is_empty() || tokens.len() < needle.len() {
        return None;
    }

    (0..=tokens.len() - needle.len())
        .filter(|&start| matches_at(&tokens, start, &needle))
        .find_map(|start| quantity_before(&tokens[..start]))
}

fn quantity_before(preceding: &[String]) -> Option<i64> {
    let mut pair = None;
    for token in preceding.iter().rev().take(LOOKBACK) {
        if BOUNDARIES.contains(&token.as_str()) {
            break;
        }
        if let Ok(n) = token.parse::<i64>() {
            return Some(n);
        }
        match NUMBER_WORDS.iter().find(|(w, _)| *w == token) {
            Some(("pair", n)) => pair = pair.or(Some(*n)),
            Some(("a" | "an", n)) if pair.is_some() => return Some(*n),
            Some((_, n)) => return Some(*n),
            None => {}
        }
    }
    pair
}

fn matches_at(tokens: &[String], start: usize, needle: &[String]) -> bool {
    let last = needle.len() - 1;
    needle.iter().enumerate().all(|(i, word)| {
        let token = &tokens[start + i];
        token == word || (i == last && is_plural_of(token, word))
    })
}

fn is_plural_of(token: &str, word: &str) -> bool {
    token
        .strip_prefix(word)
        .is_some_and(|rest| rest == "s" || rest == "es")
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn tokens_of(keyword: &str) -> Vec<String> {
    tokens(keyword)
}
