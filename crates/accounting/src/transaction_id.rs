//! Ledger transaction identifiers (`TXN001`, `TXN002`, ...).

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Prefix used when a caller does not choose one.
pub const DEFAULT_PREFIX: &str = "TXN";

/// Ledger transaction identifier.
///
/// Ordering is natural: textual head first, then the trailing number by
/// value, so `TXN1000 > TXN999` even though it sorts lower as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digit run after `prefix`, if this id is exactly `prefix` + digits.
    pub fn suffix_for(&self, prefix: &str) -> Option<&str> {
        let rest = self.0.strip_prefix(prefix)?;
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            Some(rest)
        } else {
            None
        }
    }

    /// Next identifier for `prefix` given the identifiers already issued.
    ///
    /// Only ids of the form `prefix` + digits take part. The result is the
    /// largest such suffix plus one, zero padded to at least three digits and
    /// never narrower than the widest existing suffix.
    pub fn next_after<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a TransactionId>) -> Self {
        let mut width = 3;
        let mut max: Option<&str> = None;

        for id in existing {
            let Some(suffix) = id.suffix_for(prefix) else {
                continue;
            };
            width = width.max(suffix.len());
            if max.is_none_or(|m| cmp_digits(suffix, m) == Ordering::Greater) {
                max = Some(suffix);
            }
        }

        let next = match max {
            Some(m) => increment_digits(m),
            None => "1".to_string(),
        };
        Self(format!("{prefix}{next:0>width$}"))
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Ord for TransactionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (head_a, digits_a) = split_trailing_digits(&self.0);
        let (head_b, digits_b) = split_trailing_digits(&other.0);
        head_a
            .cmp(head_b)
            .then_with(|| cmp_digits(digits_a, digits_b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for TransactionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn split_trailing_digits(s: &str) -> (&str, &str) {
    let idx = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(idx)
}

/// Compare two digit strings by numeric value without parsing (no overflow).
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Decimal increment of a digit string, e.g. "099" -> "100", "999" -> "1000".
fn increment_digits(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    let mut s = String::with_capacity(out.len() + 1);
    s.push('1');
    s.push_str(&String::from_utf8_lossy(&out));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(raw: &[&str]) -> Vec<TransactionId> {
        raw.iter().map(|s| TransactionId::from(*s)).collect()
    }

    #[test]
    fn first_id_is_padded() {
        assert_eq!(TransactionId::next_after("TXN", &[]).as_str(), "TXN001");
    }

    #[test]
    fn next_follows_the_largest_suffix() {
        let existing = ids(&["TXN001", "TXN007", "TXN003"]);
        assert_eq!(TransactionId::next_after("TXN", &existing).as_str(), "TXN008");
    }

    #[test]
    fn other_prefixes_and_non_numeric_suffixes_are_ignored() {
        let existing = ids(&["RET050", "TXN002", "TXN-abc", "TXNX9"]);
        assert_eq!(TransactionId::next_after("TXN", &existing).as_str(), "TXN003");
        assert_eq!(TransactionId::next_after("RET", &existing).as_str(), "RET051");
    }

    #[test]
    fn width_grows_past_the_padding() {
        let existing = ids(&["TXN999"]);
        let next = TransactionId::next_after("TXN", &existing);
        assert_eq!(next.as_str(), "TXN1000");
        assert!(next > existing[0]);
    }

    #[test]
    fn natural_ordering() {
        assert!(TransactionId::from("TXN010") > TransactionId::from("TXN9"));
        assert!(TransactionId::from("TXN002") > TransactionId::from("TXN001"));
        assert!(TransactionId::from("TXO001") > TransactionId::from("TXN999"));
    }

    proptest! {
        /// Property: the next id never collides and is greater than every id
        /// sharing the prefix.
        #[test]
        fn next_is_fresh_and_greatest(
            suffixes in prop::collection::vec(0u64..5000, 0..30),
            width in 1usize..6,
        ) {
            let existing: Vec<TransactionId> = suffixes
                .iter()
                .map(|n| TransactionId::new(format!("TXN{n:0>width$}")))
                .collect();
            let next = TransactionId::next_after("TXN", &existing);

            prop_assert!(!existing.contains(&next));
            for id in &existing {
                prop_assert!(&next > id);
            }
        }
    }
}
