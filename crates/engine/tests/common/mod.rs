#![allow(dead_code)]

use chrono::{DateTime, Utc};

use planledger_core::Money;
use planledger_inventory::InventoryItem;
use planledger_store::{Clock, Store};

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-10-03T09:16:59Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// The sunglasses shop: six styles and a $500 opening balance as TXN001.
pub fn sunglasses_store() -> Store {
    let mut store = Store::new().with_clock(Clock::Fixed(fixed_time()));
    let rows = [
        ("SG001", "Aviator", "Original aviator with a thin metal frame and teardrop lenses", 23, 80),
        ("SG002", "Wayfarer", "Bold acetate frame with a squared silhouette", 15, 95),
        ("SG003", "Mystique", "Cat-eye frame with gradient lenses", 6, 150),
        ("SG004", "Sport", "Wraparound frame for cycling and running", 8, 110),
        ("SG005", "Classic", "Classic round profile with minimalist metal frames", 10, 60),
        ("SG006", "Moon", "Oversized round frame with mirrored lenses", 4, 120),
    ];
    for (id, name, description, stock, dollars) in rows {
        let item = InventoryItem::new(id, name, description, stock, Money::from_units(dollars).unwrap())
            .unwrap();
        store.insert_item(item).unwrap();
    }
    store.open_ledger(Money::from_units(500).unwrap()).unwrap();
    store
}

/// Wrap a JSON plan the way a generator would.
pub fn generated(plan: &str) -> String {
    format!("Here is the plan.\n<execute_plan>\n{plan}\n</execute_plan>\nLet me know if anything else is needed.")
}

pub fn stock(store: &Store, id: &str) -> i64 {
    store.item(id).unwrap().quantity_in_stock
}
