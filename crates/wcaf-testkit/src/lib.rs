//! # WCAF Testkit
//!
//! Testing utilities for WCAF.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed events with their expected canonical encoding and hash
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding byte for byte:
//!
//! ```rust
//! use wcaf_testkit::vectors::{all_vectors, event_from_vector};
//!
//! for vector in all_vectors() {
//!     let event = event_from_vector(&vector);
//!     assert_eq!(event.event_hash, vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use wcaf_testkit::generators::{event_from_params, EventParams};
//!
//! proptest! {
//!     #[test]
//!     fn event_hash_is_deterministic(params: EventParams) {
//!         let e1 = event_from_params(&params, "GENESIS");
//!         let e2 = event_from_params(&params, "GENESIS");
//!         prop_assert_eq!(e1.event_hash, e2.event_hash);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use wcaf_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     fixture.record_invoice_flow("INV-1").await;
//!     let bundle = fixture.log.export_audit_bundle("INV-1").await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{make_chain, multi_party_fixtures, rsa_test_key, TestFixture};
pub use generators::{chain_from_params, event_from_params, EventParams};
pub use vectors::{all_vectors, event_from_vector, verify_all_vectors, GoldenVector};
