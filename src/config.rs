//! Page geometry shared by every node of a tree.
use crate::errors::Error;
use crate::storage::btree::{HEADER_SIZE, KV_HEADER_SIZE, OFFSET_SIZE, POINTER_SIZE};

/// Page size 4 kilobytes because it’s the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_MAX_KEY_SIZE: usize = 1000;
pub const DEFAULT_MAX_VAL_SIZE: usize = 3000;

/// Offsets inside a page are stored as `u16`, so a page can't be larger than this.
pub const MAX_PAGE_SIZE: usize = u16::MAX as usize + 1;

/// Sizes the node encoding depends on.
///
/// The layout itself is fixed; only the buffer size and the entry limits vary, which keeps
/// the format testable at several page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageConfig {
    page_size: usize,
    max_key_size: usize,
    max_val_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_val_size: DEFAULT_MAX_VAL_SIZE,
        }
    }
}

impl PageConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` if the page can't hold offsets as `u16` or if a single
    /// entry of maximal key and value size wouldn't fit into an otherwise empty node.
    pub fn new(page_size: usize, max_key_size: usize, max_val_size: usize) -> Result<Self, Error> {
        let config = Self {
            page_size,
            max_key_size,
            max_val_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    pub fn max_val_size(&self) -> usize {
        self.max_val_size
    }

    fn validate(&self) -> Result<(), Error> {
        if self.page_size > MAX_PAGE_SIZE {
            return Err(err!(
                Config,
                "Page size {} exceeds the maximum of {}",
                self.page_size,
                MAX_PAGE_SIZE
            ));
        }
        let largest_node =
            Self::node_size_for(1, self.max_key_size.saturating_add(self.max_val_size));
        if largest_node > self.page_size {
            return Err(err!(
                Config,
                "A node with one {}-byte key and {}-byte value needs {} bytes, page size is {}",
                self.max_key_size,
                self.max_val_size,
                largest_node,
                self.page_size
            ));
        }
        Ok(())
    }

    /// Bytes taken by the header, pointer and offset regions of a node with `nkeys` slots.
    pub fn kv_area_start(nkeys: usize) -> usize {
        HEADER_SIZE + (POINTER_SIZE + OFFSET_SIZE) * nkeys
    }

    /// Bytes one packed entry with a key and value of the given lengths occupies in the KV area.
    pub fn entry_size(key_len: usize, val_len: usize) -> usize {
        KV_HEADER_SIZE + key_len + val_len
    }

    /// Total node size for `nkeys` slots whose entries carry `payload` key and value bytes in total.
    pub fn node_size_for(nkeys: usize, payload: usize) -> usize {
        (Self::kv_area_start(nkeys) + KV_HEADER_SIZE * nkeys).saturating_add(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_disk_format() {
        let config = PageConfig::default();
        assert_eq!(config.page_size(), 4096);
        assert_eq!(config.max_key_size(), 1000);
        assert_eq!(config.max_val_size(), 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_sizes() {
        assert_eq!(PageConfig::kv_area_start(0), 4);
        assert_eq!(PageConfig::kv_area_start(2), 24);
        assert_eq!(PageConfig::entry_size(1, 1), 6);
        assert_eq!(PageConfig::node_size_for(1, 4000), 4018);
    }

    #[test]
    fn test_rejects_entry_that_cannot_fit() {
        let err = PageConfig::new(1024, 1000, 3000).unwrap_err();
        assert_eq!(err.code(), 6000);
    }

    #[test]
    fn test_rejects_oversized_page() {
        assert!(matches!(
            PageConfig::new(MAX_PAGE_SIZE * 2, 1000, 3000),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_accepts_alternate_geometries() {
        assert!(PageConfig::new(1024, 200, 600).is_ok());
        assert!(PageConfig::new(16384, 1000, 3000).is_ok());
        assert!(PageConfig::new(MAX_PAGE_SIZE, 1000, 3000).is_ok());
        assert!(PageConfig::new(4096, usize::MAX, 1).is_err());
    }
}
