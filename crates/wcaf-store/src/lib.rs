//! # WCAF Store
//!
//! Storage abstraction for WCAF audit chains. Provides a trait-based
//! interface for event and attestation persistence with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`AuditStore`] - The async trait for event storage
//! - [`AttestationStore`] - Optional attestation persistence, discovered via
//!   [`AuditStore::attestations`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AppendResult`] - Result of a compare-and-append
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wcaf_core::{EventBuilder, EventType, GENESIS};
//! use wcaf_store::{AppendResult, AuditStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("audit.db").unwrap();
//!
//!     let head = store.last_hash("INV-1").await.unwrap();
//!     let event = EventBuilder::new("INV-1", EventType::Note)
//!         .prev_hash(head.unwrap_or_else(|| GENESIS.to_string()))
//!         .seal();
//!
//!     match store.append(&event).await.unwrap() {
//!         AppendResult::Appended => {}
//!         AppendResult::HeadMoved { current } => println!("lost the race to {}", current),
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Compare-and-append**: an append whose `prev_hash` is stale returns
//!   `HeadMoved` and writes nothing, so concurrent writers cannot fork a chain
//! - **Append order**: timelines come back in insertion order
//! - **Exact round-trip**: events are stored field for field so that their
//!   hashes still verify after reading them back

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, AttestationStore, AuditStore, ChainHead};
