use super::btree::Node;
use super::pager::{PageStore, INVALID_PAGE_NUM};
use crate::config::PageConfig;
use crate::errors::Error;
use tracing::debug;

/// Handle of a disk-backed B-tree.
///
/// Holds the root page number and the store pages are fetched from, allocated in and freed
/// from. Searching and rebalancing are built on top of these three calls.
pub struct BTree<S: PageStore> {
    root: u64,
    store: S,
    config: PageConfig,
}

impl<S: PageStore> BTree<S> {
    /// Creates an empty tree (root page number 0).
    pub fn new(store: S, config: PageConfig) -> Self {
        Self {
            root: INVALID_PAGE_NUM,
            store,
            config,
        }
    }

    /// Re-opens a tree whose root is already stored under `root`.
    pub fn open(store: S, config: PageConfig, root: u64) -> Self {
        Self {
            root,
            store,
            config,
        }
    }

    pub fn root(&self) -> u64 {
        self.root
    }

    pub fn set_root(&mut self, root: u64) {
        debug!(old = self.root, new = root, "Switching root page.");
        self.root = root;
    }

    pub fn is_empty(&self) -> bool {
        self.root == INVALID_PAGE_NUM
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches the node stored under `page_num`.
    pub fn get(&self, page_num: u64) -> Result<Node, Error> {
        debug!(page_num, "Fetching page...");
        self.store.fetch(page_num)
    }

    /// Fetches the root node.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the tree is empty.
    pub fn root_node(&self) -> Result<Node, Error> {
        if self.is_empty() {
            return Err(err!(Storage, "Tree is empty, there is no root page."));
        }
        self.get(self.root)
    }

    /// Persists `node` as a new page and returns its page number.
    ///
    /// # Errors
    /// Returns `Error::Config` if the node wasn't built for this tree's page size, or whatever the
    /// store reports.
    pub fn new_page(&mut self, node: Node) -> Result<u64, Error> {
        if node.as_slice().len() != self.config.page_size() {
            return Err(err!(
                Config,
                "Node of {} bytes doesn't fit {}-byte pages",
                node.as_slice().len(),
                self.config.page_size()
            ));
        }
        let page_num = self.store.allocate(node)?;
        debug!(page_num, "Allocated page.");
        Ok(page_num)
    }

    /// Releases `page_num` back to the store.
    pub fn del(&mut self, page_num: u64) -> Result<(), Error> {
        debug!(page_num, "Freeing page...");
        self.store.free(page_num)
    }
}
