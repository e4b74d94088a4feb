//! Common library for the step runner
//!
//! This crate provides the persistence layer shared by the step runner
//! services: keyed record stores backed by local files, Redis or memory,
//! and their error types.
//!
//! ```rust,no_run
//! use common::store::{FileStore, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileStore::new("cache");
//!     store.write("user@example.com", "{}", None).await?;
//!     println!("{:?}", store.read("user@example.com").await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{FileStore, MemoryStore, RecordStore, RedisStore};
