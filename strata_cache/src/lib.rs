//! Deciding whether a backend result may be reused, and storing results that may.

use thiserror::Error;

pub mod cache;
pub mod key;
pub mod store;
pub mod strategy;

pub use cache::{CacheLookup, ResponseCache};
pub use key::{CacheKey, TableSignature};
pub use store::{MemoryResultStore, ResultStore};
pub use strategy::{CacheRequest, CacheStrategy};

#[derive(Debug, Error)]
pub enum Error {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
