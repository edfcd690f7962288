//! Persistent block/state layer over a transactional key/value backend.
//!
//! Bucket layout, key encodings, and value compression follow the on-disk
//! contract in one place each (`store`, `keys`, `encoding`); caches are
//! strictly accelerators and can be dropped at any point.

pub mod caches;
pub mod cancel;
pub mod encoding;
pub mod errors;
pub mod filter;
pub mod keys;
pub mod store;

pub use crate::cancel::CancelToken;
pub use crate::errors::StoreError;
pub use crate::filter::BlockFilter;
pub use crate::store::{PruneSummary, StateSummary, Store, StoreConfig};
