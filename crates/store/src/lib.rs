//! Transactional inventory/ledger store.
//!
//! Owns both collections and exposes the only mutation paths
//! (`adjust_stock`, `append_entry`). Callers serialize plan runs per store:
//! either by holding `&mut Store` or through a [`StoreHandle`].

pub mod handle;
pub mod store;

pub use handle::StoreHandle;
pub use store::{Clock, Store, StoreSnapshot};
