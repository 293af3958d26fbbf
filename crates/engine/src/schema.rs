//! Text description of the live store, handed to the plan generator.

use std::fmt::Write as _;

use serde::Serialize;

use planledger_accounting::{DEFAULT_PREFIX, LedgerEntry};
use planledger_core::Described;
use planledger_inventory::InventoryItem;
use planledger_store::Store;

use crate::result::PlanStatus;

/// Describe both collections, a few sample rows of each, and the helper
/// values a plan can read. Reads the store on every call.
pub fn describe(store: &Store, sample_size: usize) -> String {
    let mut out = String::new();

    collection::<InventoryItem>(&mut out, store.items(), sample_size);
    out.push('\n');
    collection::<LedgerEntry>(&mut out, store.entries(), sample_size);
    out.push('\n');

    let _ = writeln!(out, "helpers:");
    let _ = writeln!(out, "- current_balance = {}", store.current_balance());
    let _ = writeln!(
        out,
        "- next_id(\"{DEFAULT_PREFIX}\") = {}",
        store.next_id(DEFAULT_PREFIX)
    );
    let statuses: Vec<&str> = PlanStatus::ALL.iter().map(|s| s.as_str()).collect();
    let _ = writeln!(out, "- status must be one of: {}", statuses.join(", "));
    out
}

fn collection<T: Described + Serialize>(out: &mut String, rows: &[T], sample_size: usize) {
    let _ = writeln!(out, "collection `{}` ({} rows)", T::COLLECTION, rows.len());
    for f in T::fields() {
        let _ = writeln!(out, "- {} ({}): {}", f.name, f.ty, f.meaning);
    }
    if sample_size == 0 || rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "sample rows:");
    for row in rows.iter().take(sample_size) {
        let _ = writeln!(out, "  {}", serde_json::to_string(row).unwrap_or_default());
    }
}
