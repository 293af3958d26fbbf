//! `planledger-core`
//!
//! Error taxonomy, money, run identifiers and the record descriptions the
//! schema introspector reads. No IO lives here.

pub mod describe;
pub mod error;
pub mod id;
pub mod money;

pub use describe::{Described, FieldSpec};
pub use error::{StoreError, StoreResult};
pub use id::RunId;
pub use money::Money;
