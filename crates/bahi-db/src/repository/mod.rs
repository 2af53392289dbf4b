//! # Repository Modules
//!
//! One repository per entity family. Repositories own reads and sync
//! writes; running balances are only ever written by the ledger engine.

pub mod cursor;
pub mod party;
pub mod payment_method;
pub mod product;
pub mod reference;
pub mod sync;
pub mod tombstone;
pub mod transaction;
