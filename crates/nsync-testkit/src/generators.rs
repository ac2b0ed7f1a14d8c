//! Proptest generators for property-based testing.

use proptest::prelude::*;

use nsync_core::{Checksum, DataRecord, SynchronizationStatus};

/// Generate a random checksum.
pub fn checksum() -> impl Strategy<Value = Checksum> {
    any::<[u8; 16]>().prop_map(Checksum::from_bytes)
}

/// Generate a synchronization status.
pub fn status() -> impl Strategy<Value = SynchronizationStatus> {
    prop_oneof![
        Just(SynchronizationStatus::Pending),
        Just(SynchronizationStatus::Transferring),
        Just(SynchronizationStatus::Synchronized),
    ]
}

/// Generate a data record with a non-negative size and timestamp.
pub fn data_record() -> impl Strategy<Value = DataRecord> {
    (checksum(), 0i64..=i64::MAX / 2, 0i64..=i64::MAX / 2, status()).prop_map(
        |(checksum, size, modified_ms, status)| DataRecord {
            checksum,
            size,
            modified_ms,
            status,
        },
    )
}

/// Generate a relative path of one to three segments, `/`-separated.
pub fn relative_path() -> impl Strategy<Value = String> {
    // Segments never end in '.', which rules out "." and "..".
    prop::collection::vec("[a-zA-Z0-9_ .-]{0,11}[a-zA-Z0-9_]", 1..=3)
        .prop_map(|segments| segments.join("/"))
}

/// An operation against an index.
#[derive(Debug, Clone)]
pub enum IndexOp {
    Set(String, DataRecord),
    Remove(String),
}

/// Generate index operations over a small pool of paths, so overwrites and
/// removals of existing entries are common.
pub fn index_ops(max_len: usize) -> impl Strategy<Value = Vec<IndexOp>> {
    prop::collection::vec(relative_path(), 1..=6).prop_flat_map(move |pool| {
        let pick = prop::sample::select(pool);
        let op = prop_oneof![
            3 => (pick.clone(), data_record()).prop_map(|(path, record)| IndexOp::Set(path, record)),
            1 => pick.prop_map(IndexOp::Remove),
        ];
        prop::collection::vec(op, 0..=max_len)
    })
}
