//! Page storage seam of the tree.
use super::btree::Node;
use crate::config::PageConfig;
use crate::errors::Error;
use tracing::{debug, trace};

/// Page number meaning "no page". Valid page numbers start at 1.
pub const INVALID_PAGE_NUM: u64 = 0;

pub const PAGER_MAX_PAGES: usize = 100;

/// The operations a tree needs from whatever persists its pages.
///
/// Nodes only ever reach storage through this trait; how pages end up on disk, and when, is up
/// to the implementation.
pub trait PageStore {
    /// Reads the page stored under `page_num`.
    fn fetch(&self, page_num: u64) -> Result<Node, Error>;

    /// Persists a new page and returns its number.
    fn allocate(&mut self, node: Node) -> Result<u64, Error>;

    /// Releases `page_num`, which may then be handed out again by `allocate`.
    fn free(&mut self, page_num: u64) -> Result<(), Error>;
}

/// A page store keeping a bounded number of pages in memory.
///
/// Page `n` lives in slot `n - 1`. Freed slots are remembered and reused before the store
/// grows.
pub struct MemPager {
    pages: heapless::Vec<Option<Node>, PAGER_MAX_PAGES>,
    free: heapless::Vec<u64, PAGER_MAX_PAGES>,
    config: PageConfig,
}

impl MemPager {
    pub fn new(config: PageConfig) -> Self {
        Self {
            pages: heapless::Vec::new(),
            free: heapless::Vec::new(),
            config,
        }
    }

    /// Number of pages currently allocated.
    pub fn len(&self) -> usize {
        self.pages.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, page_num: u64) -> Result<usize, Error> {
        if page_num == INVALID_PAGE_NUM || page_num > self.pages.len() as u64 {
            return Err(err!(Storage, "Memory page {} not found.", page_num));
        }
        Ok(page_num as usize - 1)
    }
}

impl PageStore for MemPager {
    fn fetch(&self, page_num: u64) -> Result<Node, Error> {
        let slot = self.slot(page_num)?;
        match &self.pages[slot] {
            Some(node) => Ok(node.clone()),
            None => Err(err!(Storage, "Memory page {} was freed.", page_num)),
        }
    }

    fn allocate(&mut self, node: Node) -> Result<u64, Error> {
        if node.config().page_size() != self.config.page_size() {
            return Err(err!(
                Config,
                "Page of {} bytes doesn't belong to a store of {}-byte pages",
                node.config().page_size(),
                self.config.page_size()
            ));
        }

        if let Some(page_num) = self.free.pop() {
            self.pages[page_num as usize - 1] = Some(node);
            trace!(page_num, "Reused a freed page.");
            return Ok(page_num);
        }

        self.pages
            .push(Some(node))
            .map_err(|_| err!(Storage, "Pager is full ({} pages).", PAGER_MAX_PAGES))?;
        let page_num = self.pages.len() as u64;
        debug!(page_num, "Allocated a new page.");
        Ok(page_num)
    }

    fn free(&mut self, page_num: u64) -> Result<(), Error> {
        let slot = self.slot(page_num)?;
        if self.pages[slot].take().is_none() {
            return Err(err!(Storage, "Memory page {} is already free.", page_num));
        }
        self.free
            .push(page_num)
            .map_err(|_| err!(Storage, "Free list is full."))?;
        debug!(page_num, "Freed a page.");
        Ok(())
    }
}
