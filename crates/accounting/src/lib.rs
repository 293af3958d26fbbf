//! Accounting module (append-only running-balance ledger).
//!
//! Pure domain logic only: no IO, no persistence concerns.

pub mod ledger;
pub mod transaction_id;

pub use ledger::{Ledger, LedgerEntry, NewLedgerEntry, OPENING_BALANCE};
pub use transaction_id::{DEFAULT_PREFIX, TransactionId};
