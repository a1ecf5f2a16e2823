//! Node encoding and the storage seam of the B-tree.
pub mod btree;
pub mod pager;
pub mod tree;

pub use btree::{Node, NodeType};
pub use pager::{MemPager, PageStore};
pub use tree::BTree;
