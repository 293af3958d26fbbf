use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use planledger_core::{Described, FieldSpec, Money, StoreError, StoreResult};

use crate::transaction_id::TransactionId;

/// Reserved customer name of the opening-balance entry.
pub const OPENING_BALANCE: &str = "OPENING_BALANCE";

/// One immutable ledger row.
///
/// `amount` is signed: negative for sales, positive for returns, restocks and
/// the opening balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub customer_name: String,
    #[serde(alias = "transaction_summary")]
    pub summary: String,
    #[serde(alias = "transaction_amount")]
    pub amount: Money,
    #[serde(alias = "balance_after_transaction")]
    pub balance_after: Money,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_opening_balance(&self) -> bool {
        self.customer_name == OPENING_BALANCE
    }
}

impl Described for LedgerEntry {
    const COLLECTION: &'static str = "ledger";

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("transaction_id", "string", "unique id, prefix + number, e.g. TXN001"),
            FieldSpec::new(
                "customer_name",
                "string",
                "customer, or OPENING_BALANCE for the initial entry",
            ),
            FieldSpec::new("summary", "string", "short description of the transaction"),
            FieldSpec::new(
                "amount",
                "decimal",
                "signed: negative for sales, positive for returns/restocks",
            ),
            FieldSpec::new("balance_after", "decimal", "running balance after this entry"),
            FieldSpec::new("timestamp", "string", "ISO-8601 creation time"),
        ];
        FIELDS
    }
}

/// Entry as submitted by a caller, before the ledger accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub transaction_id: TransactionId,
    pub customer_name: String,
    pub summary: String,
    pub amount: Money,
    /// Computed from the current balance when omitted; checked when supplied.
    #[serde(default)]
    pub balance_after: Option<Money>,
    /// Assigned by the ledger when omitted.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewLedgerEntry {
    pub fn new(
        transaction_id: TransactionId,
        customer_name: impl Into<String>,
        summary: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            transaction_id,
            customer_name: customer_name.into(),
            summary: summary.into(),
            amount,
            balance_after: None,
            timestamp: None,
        }
    }

    pub fn with_balance_after(mut self, balance_after: Money) -> Self {
        self.balance_after = Some(balance_after);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Append-only ledger with a chained running balance.
///
/// Invariant: `entries[n].balance_after == entries[n-1].balance_after + entries[n].amount`,
/// and `entries[0].balance_after == entries[0].amount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from stored rows, re-checking the chain and id uniqueness.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> StoreResult<Self> {
        let mut ledger = Self::new();
        for e in entries {
            let new = NewLedgerEntry {
                transaction_id: e.transaction_id,
                customer_name: e.customer_name,
                summary: e.summary,
                amount: e.amount,
                balance_after: Some(e.balance_after),
                timestamp: Some(e.timestamp),
            };
            ledger.append(new, e.timestamp)?;
        }
        Ok(ledger)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.entries.iter().any(|e| &e.transaction_id == id)
    }

    /// `balance_after` of the most recent entry, or zero for an empty ledger.
    pub fn current_balance(&self) -> Money {
        self.entries
            .last()
            .map(|e| e.balance_after)
            .unwrap_or(Money::ZERO)
    }

    /// Next free identifier for `prefix` (deterministic in the ledger state).
    pub fn next_id(&self, prefix: &str) -> TransactionId {
        TransactionId::next_after(prefix, self.entries.iter().map(|e| &e.transaction_id))
    }

    /// Append an entry, enforcing id uniqueness and the balance chain.
    ///
    /// `now` is used when the entry carries no timestamp.
    pub fn append(&mut self, entry: NewLedgerEntry, now: DateTime<Utc>) -> StoreResult<LedgerEntry> {
        if entry.transaction_id.as_str().trim().is_empty() {
            return Err(StoreError::validation("transaction_id cannot be empty"));
        }
        if self.contains(&entry.transaction_id) {
            return Err(StoreError::duplicate(entry.transaction_id.as_str()));
        }

        let expected = self.current_balance().checked_add(entry.amount)?;
        if let Some(actual) = entry.balance_after {
            if actual != expected {
                return Err(StoreError::BalanceMismatch { expected, actual });
            }
        }

        let stored = LedgerEntry {
            transaction_id: entry.transaction_id,
            customer_name: entry.customer_name,
            summary: entry.summary,
            amount: entry.amount,
            balance_after: expected,
            timestamp: entry.timestamp.unwrap_or(now),
        };
        self.entries.push(stored.clone());
        Ok(stored)
    }

    /// Record the opening balance. Only valid on an empty ledger.
    pub fn open(&mut self, prefix: &str, amount: Money, now: DateTime<Utc>) -> StoreResult<LedgerEntry> {
        if !self.is_empty() {
            return Err(StoreError::validation(
                "opening balance can only be recorded on an empty ledger",
            ));
        }
        let id = self.next_id(prefix);
        self.append(
            NewLedgerEntry::new(id, OPENING_BALANCE, "Daily opening register balance", amount),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn opened(cents: i64) -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .open("TXN", Money::from_cents(cents), test_time())
            .unwrap();
        ledger
    }

    #[test]
    fn empty_ledger_has_zero_balance() {
        assert_eq!(Ledger::new().current_balance(), Money::ZERO);
    }

    #[test]
    fn opening_entry_balance_equals_amount() {
        let ledger = opened(50_000);
        let first = &ledger.entries()[0];
        assert!(first.is_opening_balance());
        assert_eq!(first.transaction_id.as_str(), "TXN001");
        assert_eq!(first.balance_after, Money::from_cents(50_000));
    }

    #[test]
    fn append_chains_balance_and_assigns_timestamp() {
        let mut ledger = opened(50_000);
        let now = test_time();
        let id = ledger.next_id("TXN");
        let e = ledger
            .append(
                NewLedgerEntry::new(id, "Alice", "Return 2 Aviator", Money::from_cents(16_000)),
                now,
            )
            .unwrap();
        assert_eq!(e.transaction_id.as_str(), "TXN002");
        assert_eq!(e.balance_after, Money::from_cents(66_000));
        assert_eq!(e.timestamp, now);
        assert_eq!(ledger.entries().last(), Some(&e));
        assert_eq!(ledger.current_balance(), Money::from_cents(66_000));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut ledger = opened(100);
        let err = ledger
            .append(
                NewLedgerEntry::new("TXN001".into(), "Bob", "dup", Money::from_cents(1)),
                test_time(),
            )
            .unwrap_err();
        assert_eq!(err, StoreError::duplicate("TXN001"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn inconsistent_balance_after_is_rejected() {
        let mut ledger = opened(100);
        let err = ledger
            .append(
                NewLedgerEntry::new("TXN002".into(), "Bob", "sale", Money::from_cents(-40))
                    .with_balance_after(Money::from_cents(100)),
                test_time(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::BalanceMismatch { .. }));
    }

    #[test]
    fn open_twice_is_rejected() {
        let mut ledger = opened(100);
        assert!(ledger.open("TXN", Money::from_cents(5), test_time()).is_err());
    }

    #[test]
    fn from_entries_rejects_broken_chain() {
        let ledger = opened(100);
        let mut rows = ledger.entries().to_vec();
        let mut broken = rows[0].clone();
        broken.transaction_id = "TXN002".into();
        broken.amount = Money::from_cents(10);
        broken.balance_after = Money::from_cents(999);
        rows.push(broken);
        assert!(Ledger::from_entries(rows).is_err());
    }

    #[test]
    fn accepts_legacy_field_names() {
        let e: LedgerEntry = serde_json::from_str(
            r#"{
                "transaction_id": "TXN001",
                "customer_name": "OPENING_BALANCE",
                "transaction_summary": "Daily opening register balance",
                "transaction_amount": 500.0,
                "balance_after_transaction": 500.0,
                "timestamp": "2025-10-03T09:16:59.628898Z"
            }"#,
        )
        .unwrap();
        assert_eq!(e.amount, Money::from_cents(50_000));
        assert!(e.is_opening_balance());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of appends the chain holds and the
        /// current balance is the last balance_after.
        #[test]
        fn balance_chain_holds(
            opening in 0i64..1_000_000,
            amounts in prop::collection::vec(-100_000i64..100_000, 0..20)
        ) {
            let mut ledger = opened(opening);
            for a in amounts {
                let id = ledger.next_id("TXN");
                ledger
                    .append(NewLedgerEntry::new(id, "c", "s", Money::from_cents(a)), test_time())
                    .unwrap();
            }

            let entries = ledger.entries();
            prop_assert_eq!(entries[0].balance_after, entries[0].amount);
            for w in entries.windows(2) {
                prop_assert_eq!(
                    w[1].balance_after.cents(),
                    w[0].balance_after.cents() + w[1].amount.cents()
                );
                prop_assert!(w[1].transaction_id > w[0].transaction_id);
            }
            prop_assert_eq!(ledger.current_balance(), entries.last().unwrap().balance_after);
        }
    }
}
