//! Account ledger: per-user records, the keyed lock table that serializes
//! access to them, and the transaction primitives built on top.

pub mod account;
pub mod store;
pub mod transactions;

pub use account::{Account, CaughtItem, UserId};
pub use store::{LedgerStore, WorkingSet};
pub use transactions::{ClampedDebit, DailyClaim, TransactionEngine, TransferReceipt};
