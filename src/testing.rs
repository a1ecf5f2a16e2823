//! Strategies and helpers shared by the unit tests.
use proptest::collection::vec;
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::storage::btree::{NodeType, HEADER_SIZE, OFFSET_SIZE, POINTER_SIZE};

/// Number of slots whose pointers and offsets still fit a default page.
pub const MAX_FITTING_KEYS: u16 =
    ((DEFAULT_PAGE_SIZE - HEADER_SIZE) / (POINTER_SIZE + OFFSET_SIZE)) as u16;

/// Installs a test-friendly subscriber; `RUST_LOG=trace` shows what the tests do.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn node_type() -> impl Strategy<Value = NodeType> {
    prop_oneof![Just(NodeType::Internal), Just(NodeType::Leaf)]
}

/// A key count in `1..=max` together with a valid slot index for it.
pub fn slot(max: u16) -> impl Strategy<Value = (u16, u16)> {
    (1..=max).prop_flat_map(|nkeys| (Just(nkeys), 0..nkeys))
}

/// Entries small enough that any generated sequence fits a default page.
pub fn entries() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    vec((vec(any::<u8>(), 0..64), vec(any::<u8>(), 0..128)), 0..16)
}
