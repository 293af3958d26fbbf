use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use planledger_accounting::{DEFAULT_PREFIX, Ledger, LedgerEntry, NewLedgerEntry, TransactionId};
use planledger_core::{Money, StoreError, StoreResult};
use planledger_inventory::InventoryItem;

/// Time source for server-assigned ledger timestamps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    /// Always returns the same instant (tests, replays).
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Independent copy of both collections, for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub items: Vec<InventoryItem>,
    pub entries: Vec<LedgerEntry>,
}

/// On-disk layout. `transactions` is accepted for files written by older tooling.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    inventory: Vec<InventoryItem>,
    #[serde(alias = "transactions")]
    ledger: Vec<LedgerEntry>,
}

/// In-memory inventory + ledger.
///
/// `Clone` is cheap enough for the store sizes this engine targets; the
/// sandbox relies on it to stage a run against a private copy.
#[derive(Debug, Clone, Default)]
pub struct Store {
    items: Vec<InventoryItem>,
    ledger: Ledger,
    clock: Clock,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing rows, re-validating every invariant.
    pub fn from_parts(items: Vec<InventoryItem>, entries: Vec<LedgerEntry>) -> StoreResult<Self> {
        let mut store = Self::new();
        for item in items {
            store.insert_item(item)?;
        }
        store.ledger = Ledger::from_entries(entries)?;
        Ok(store)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Seed-time insert. Item ids are unique.
    pub fn insert_item(&mut self, item: InventoryItem) -> StoreResult<()> {
        item.validate()?;
        if self.item(item.item_id.as_str()).is_some() {
            return Err(StoreError::duplicate(item.item_id.as_str()));
        }
        self.items.push(item);
        Ok(())
    }

    /// Record the opening balance on an empty ledger.
    pub fn open_ledger(&mut self, amount: Money) -> StoreResult<LedgerEntry> {
        let now = self.clock.now();
        self.ledger.open(DEFAULT_PREFIX, amount, now)
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        self.ledger.entries()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn item(&self, item_id: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.item_id.as_str() == item_id)
    }

    /// `balance_after` of the most recent entry, or zero.
    pub fn current_balance(&self) -> Money {
        self.ledger.current_balance()
    }

    /// Identifier guaranteed to order after every id sharing `prefix`.
    pub fn next_id(&self, prefix: &str) -> TransactionId {
        self.ledger.next_id(prefix)
    }

    /// Items matching `predicate`, in insertion order.
    pub fn find<P>(&self, predicate: P) -> Vec<InventoryItem>
    where
        P: Fn(&InventoryItem) -> bool,
    {
        self.items.iter().filter(|i| predicate(i)).cloned().collect()
    }

    /// Apply a signed stock delta; returns the new quantity.
    pub fn adjust_stock(&mut self, item_id: &str, delta: i64) -> StoreResult<i64> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.item_id.as_str() == item_id)
            .ok_or_else(|| StoreError::not_found(item_id))?;
        let quantity = item.adjust(delta)?;
        debug!(item_id, delta, quantity, "stock adjusted");
        Ok(quantity)
    }

    /// Append a ledger entry; returns the stored row.
    pub fn append_entry(&mut self, entry: NewLedgerEntry) -> StoreResult<LedgerEntry> {
        let now = self.clock.now();
        let stored = self.ledger.append(entry, now)?;
        debug!(
            transaction_id = %stored.transaction_id,
            amount = %stored.amount,
            balance_after = %stored.balance_after,
            "ledger entry appended"
        );
        Ok(stored)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            items: self.items.clone(),
            entries: self.ledger.entries().to_vec(),
        }
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        let file: StoreFile =
            serde_json::from_str(json).map_err(|e| StoreError::persistence(e.to_string()))?;
        Self::from_parts(file.inventory, file.ledger)
    }

    pub fn to_json_pretty(&self) -> StoreResult<String> {
        let file = StoreFile {
            inventory: self.items.clone(),
            ledger: self.ledger.entries().to_vec(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| StoreError::persistence(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::persistence(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .map_err(|e| StoreError::persistence(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-10-03T09:16:59Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn item(id: &str, name: &str, stock: i64, price_cents: i64) -> InventoryItem {
        InventoryItem::new(id, name, format!("{name} frame"), stock, Money::from_cents(price_cents))
            .unwrap()
    }

    fn seeded() -> Store {
        let mut store = Store::new().with_clock(Clock::Fixed(fixed_time()));
        store.insert_item(item("SG001", "Aviator", 23, 8000)).unwrap();
        store.insert_item(item("SG002", "Wayfarer", 4, 9500)).unwrap();
        store.open_ledger(Money::from_cents(50_000)).unwrap();
        store
    }

    #[test]
    fn find_preserves_insertion_order_and_never_errors() {
        let store = seeded();
        let all = store.find(|_| true);
        assert_eq!(all[0].item_id.as_str(), "SG001");
        assert_eq!(all[1].item_id.as_str(), "SG002");
        assert!(store.find(|i| i.price > Money::from_cents(1_000_000)).is_empty());
    }

    #[test]
    fn adjust_unknown_item_is_not_found() {
        let mut store = seeded();
        assert_eq!(store.adjust_stock("NOPE", 1).unwrap_err(), StoreError::not_found("NOPE"));
    }

    #[test]
    fn adjust_below_zero_is_invalid() {
        let mut store = seeded();
        let err = store.adjust_stock("SG002", -5).unwrap_err();
        assert!(matches!(err, StoreError::InvalidAdjustment { available: 4, delta: -5, .. }));
        assert_eq!(store.item("SG002").unwrap().quantity_in_stock, 4);
    }

    #[test]
    fn append_entry_uses_store_clock() {
        let mut store = seeded();
        let id = store.next_id("TXN");
        let e = store
            .append_entry(NewLedgerEntry::new(id, "Alice", "Return", Money::from_cents(16_000)))
            .unwrap();
        assert_eq!(e.timestamp, fixed_time());
        assert_eq!(e.balance_after, Money::from_cents(66_000));
    }

    #[test]
    fn duplicate_item_is_rejected() {
        let mut store = seeded();
        let err = store.insert_item(item("SG001", "Again", 1, 1)).unwrap_err();
        assert_eq!(err, StoreError::duplicate("SG001"));
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut store = seeded();
        let before = store.snapshot();
        store.adjust_stock("SG001", 2).unwrap();
        assert_eq!(before.items[0].quantity_in_stock, 23);
        assert_eq!(store.snapshot().items[0].quantity_in_stock, 25);
    }

    #[test]
    fn save_then_load_preserves_rows() {
        let store = seeded();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        store.save(&path).unwrap();

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn load_rejects_negative_stock() {
        let json = r#"{
            "inventory": [{"item_id":"SG001","name":"Aviator","quantity_in_stock":-1,"price":80}],
            "transactions": []
        }"#;
        assert!(matches!(Store::from_json(json), Err(StoreError::Validation { .. })));
    }

    #[test]
    fn load_missing_file_is_persistence_error() {
        let err = Store::load("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.code(), "persistence");
    }

    proptest! {
        /// Property: current_balance equals the last balance_after (or zero),
        /// whatever mix of successful and rejected appends happened.
        #[test]
        fn current_balance_tracks_last_entry(
            amounts in prop::collection::vec(-10_000i64..10_000, 0..15),
            reuse_first in any::<bool>(),
        ) {
            let mut store = Store::new();
            prop_assert_eq!(store.current_balance(), Money::ZERO);

            for a in amounts {
                let id = if reuse_first && !store.entries().is_empty() {
                    store.entries()[0].transaction_id.clone()
                } else {
                    store.next_id("TXN")
                };
                let _ = store.append_entry(NewLedgerEntry::new(id, "c", "s", Money::from_cents(a)));
                let expected = store.entries().last().map(|e| e.balance_after).unwrap_or(Money::ZERO);
                prop_assert_eq!(store.current_balance(), expected);
            }
        }
    }
}
