//! # NSync Testkit
//!
//! Testing utilities for NSync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a temporary local/remote folder pair with a daemon
//!   configuration, plus recording, failing and panicking bus consumers
//! - **Generators**: Proptest strategies for records and relative paths
//! - **Scenarios**: helpers that wait for signals, index states and remote
//!   copies with a deadline
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use nsync_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let kernel = fixture.boot().await;
//!     let folder = kernel
//!         .facade()
//!         .add_folder(&fixture.local_uri(), &fixture.remote_uri())
//!         .await
//!         .unwrap();
//!     fixture.put("x.txt", "hi");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use nsync_testkit::generators::{data_record, relative_path};
//!
//! proptest! {
//!     #[test]
//!     fn record_bytes_are_stable(record in data_record()) {
//!         prop_assert_eq!(record.to_bytes(), record.to_bytes());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod scenarios;

pub use fixtures::{
    init_tracing, wait_until, FailingConsumer, PanickingConsumer, RecordingConsumer, TestFixture,
};
pub use generators::{checksum, data_record, relative_path, status};
pub use scenarios::{expect_signal, expect_silence, wait_for_record, wait_for_remote};
