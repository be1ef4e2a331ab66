pub mod account;
pub mod mapping;

pub use account::{sorted_by_name, AccountClass, AccountRecord, AccountSnapshot, Ledger};
pub use mapping::{LedgerLink, MappingDocument, MappingEntry};
