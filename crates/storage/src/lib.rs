pub mod document;

pub use document::{MappingStore, StoreError};
