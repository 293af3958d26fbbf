//! Inventory records.
//!
//! Pure domain logic only: stock rules live here, storage lives in
//! `planledger-store`.

pub mod item;

pub use item::{InventoryItem, ItemId, contains_word};
