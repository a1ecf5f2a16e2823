//! Page encoding for the nodes of a disk-backed B-tree.
//!
//! A node is one fixed-size page holding a header, child pointers, an offset index and packed
//! key-value entries. [`storage::Node`] reads and writes those regions in place;
//! [`storage::BTree`] ties nodes to a [`storage::PageStore`] that persists them.
#[macro_use]
pub mod errors;
pub mod config;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::PageConfig;
pub use errors::Error;
