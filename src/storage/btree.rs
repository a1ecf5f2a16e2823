//! On-disk layout of a B-tree node.
//!
//! Every node occupies exactly one page. Internal nodes and leaf nodes share the same layout:
//!
//! | **Region**        | **Size**         | **Content**                                              |
//! |-------------------|------------------|----------------------------------------------------------|
//! | **Header**        | 4 bytes          | node type (`u16`), number of keys `nkeys` (`u16`)        |
//! | **Pointers**      | `8 * nkeys`      | child page numbers (`u64`), only meaningful for internal |
//! | **Offsets**       | `2 * nkeys`      | end of each entry relative to the KV area (`u16`)        |
//! | **Key-values**    | variable         | packed entries: `klen` (`u16`), `vlen` (`u16`), key, val |
//!
//! The offset of the first entry is always zero and is not stored, so the offset array holds the
//! positions of entries `1..=nkeys`. The last one is the end of the KV area, which makes the size of
//! a node computable from its header and offsets alone, and lets the Nth key be located without
//! scanning the entries before it.
//!
//! All integers are little-endian.
use crate::config::PageConfig;
use crate::errors::Error;
use std::fmt;
use tracing::{trace, warn};

/// Represents the type of a B-tree node.
///
/// | Property | Internal Node                 | Leaf Node         |
/// |----------|-------------------------------|-------------------|
/// | Stores   | keys and pointers to children | keys and values   |
/// | On disk  | `1`                           | `2`               |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// An internal node containing keys and child pointers.
    Internal,
    /// A leaf node containing key-value pairs.
    Leaf,
}

pub const BNODE_INTERNAL: u16 = 1;
pub const BNODE_LEAF: u16 = 2;

// Header Layout

/// Offset of the node type field (starts at 0)
const NODE_TYPE_OFFSET: usize = 0;

/// Size of the node type field (2 bytes, equivalent to uint16_t)
const NODE_TYPE_SIZE: usize = std::mem::size_of::<u16>();

/// Offset of the nkeys field (after node type)
const NKEYS_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;

/// Size of the nkeys field (2 bytes, equivalent to uint16_t)
const NKEYS_SIZE: usize = std::mem::size_of::<u16>();

/// Total size of the node header.
pub const HEADER_SIZE: usize = NODE_TYPE_SIZE + NKEYS_SIZE;

// Body Layout

/// Size of a child pointer (a page number).
pub const POINTER_SIZE: usize = std::mem::size_of::<u64>();

/// Size of one entry of the offset array.
pub const OFFSET_SIZE: usize = std::mem::size_of::<u16>();

/// Size of the key length field at the start of each packed entry.
const KEY_LEN_SIZE: usize = std::mem::size_of::<u16>();

/// Size of the value length field, following the key length.
const VAL_LEN_SIZE: usize = std::mem::size_of::<u16>();

/// Bytes preceding the key in a packed entry.
pub const KV_HEADER_SIZE: usize = KEY_LEN_SIZE + VAL_LEN_SIZE;

/// A B-tree node, owning its page buffer.
///
/// The accessors compute byte positions from the header on every call, so the header has to be
/// written (with the final number of keys) before pointers, offsets or entries are.
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    data: Vec<u8>,
    config: PageConfig,
}

impl Node {
    /// Allocates a zero-filled node of exactly `config.page_size()` bytes.
    ///
    /// # Examples
    /// ```
    /// use bnode::config::PageConfig;
    /// use bnode::storage::btree::Node;
    /// let node = Node::new(PageConfig::default());
    /// assert_eq!(node.as_slice().len(), 4096);
    /// ```
    pub fn new(config: PageConfig) -> Self {
        Self {
            data: vec![0u8; config.page_size()],
            config,
        }
    }

    /// Allocates an empty leaf node.
    pub fn leaf(config: PageConfig) -> Self {
        let mut node = Self::new(config);
        node.set_header(NodeType::Leaf, 0);
        node
    }

    /// Allocates an empty internal node.
    pub fn internal(config: PageConfig) -> Self {
        let mut node = Self::new(config);
        node.set_header(NodeType::Internal, 0);
        node
    }

    /// Wraps a page read back from storage.
    ///
    /// # Errors
    /// Returns `Error::Config` if the buffer is not exactly one page long.
    pub fn from_bytes(config: PageConfig, data: Vec<u8>) -> Result<Self, Error> {
        if data.len() != config.page_size() {
            return Err(err!(
                Config,
                "Buffer of {} bytes is not a {}-byte page",
                data.len(),
                config.page_size()
            ));
        }
        Ok(Self { data, config })
    }

    /// Returns an immutable reference to the raw page buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    // Header

    /// Returns the raw node type as stored in the header.
    ///
    /// The value is not validated; see [`Node::node_type`] for the checked variant.
    pub fn btype(&self) -> u16 {
        u16::from_le_bytes([self.data[NODE_TYPE_OFFSET], self.data[NODE_TYPE_OFFSET + 1]])
    }

    /// Returns the number of keys stored in this node.
    pub fn nkeys(&self) -> u16 {
        u16::from_le_bytes([self.data[NKEYS_OFFSET], self.data[NKEYS_OFFSET + 1]])
    }

    /// Returns the node type.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` if the header holds neither `BNODE_INTERNAL` nor `BNODE_LEAF`.
    pub fn node_type(&self) -> Result<NodeType, Error> {
        NodeType::try_from(self.btype())
    }

    /// Writes the node type and the number of keys.
    pub fn set_header(&mut self, node_type: NodeType, nkeys: u16) {
        self.set_header_raw(node_type.into(), nkeys);
    }

    /// Writes the header without checking that `btype` is a known node type.
    pub fn set_header_raw(&mut self, btype: u16, nkeys: u16) {
        self.data[NODE_TYPE_OFFSET..NODE_TYPE_OFFSET + NODE_TYPE_SIZE]
            .copy_from_slice(&btype.to_le_bytes());
        self.data[NKEYS_OFFSET..NKEYS_OFFSET + NKEYS_SIZE].copy_from_slice(&nkeys.to_le_bytes());
    }

    // Pointers

    /// Returns the child pointer of slot `idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx >= nkeys`.
    pub fn get_ptr(&self, idx: u16) -> Result<u64, Error> {
        let pos = self.ptr_pos(idx)?;
        Ok(u64::from_le_bytes(self.array_at(pos)?))
    }

    /// Sets the child pointer of slot `idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx >= nkeys`.
    pub fn set_ptr(&mut self, idx: u16, ptr: u64) -> Result<(), Error> {
        let pos = self.ptr_pos(idx)?;
        self.slice_at_mut(pos, POINTER_SIZE)?
            .copy_from_slice(&ptr.to_le_bytes());
        Ok(())
    }

    fn ptr_pos(&self, idx: u16) -> Result<usize, Error> {
        self.check_slot(idx, "Pointer")?;
        Ok(HEADER_SIZE + POINTER_SIZE * idx as usize)
    }

    // Offsets

    /// Returns the offset of entry `idx` relative to the start of the KV area.
    ///
    /// The offset of the first entry is always zero and never read from the page.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx > nkeys`.
    pub fn get_offset(&self, idx: u16) -> Result<u16, Error> {
        if idx == 0 {
            return Ok(0);
        }
        let pos = self.offset_pos(idx)?;
        Ok(u16::from_le_bytes(self.array_at(pos)?))
    }

    /// Stores the offset of entry `idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` unless `1 <= idx <= nkeys`; the first offset is implicit.
    pub fn set_offset(&mut self, idx: u16, offset: u16) -> Result<(), Error> {
        let pos = self.offset_pos(idx)?;
        self.slice_at_mut(pos, OFFSET_SIZE)?
            .copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    fn offset_pos(&self, idx: u16) -> Result<usize, Error> {
        let nkeys = self.nkeys();
        if idx < 1 || idx > nkeys {
            return Err(err!(
                IndexOutOfRange,
                "Offset index {} outside 1..={}",
                idx,
                nkeys
            ));
        }
        Ok(HEADER_SIZE + POINTER_SIZE * nkeys as usize + OFFSET_SIZE * (idx as usize - 1))
    }

    // Key-values

    /// Returns the position of entry `idx` within the page.
    ///
    /// `idx == nkeys` is allowed and yields the end of the last entry.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx > nkeys`.
    pub fn kv_pos(&self, idx: u16) -> Result<usize, Error> {
        let nkeys = self.nkeys();
        if idx > nkeys {
            return Err(err!(
                IndexOutOfRange,
                "Entry index {} exceeds nkeys {}",
                idx,
                nkeys
            ));
        }
        Ok(PageConfig::kv_area_start(nkeys as usize) + self.get_offset(idx)? as usize)
    }

    /// Returns the key of entry `idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx >= nkeys`, `Error::OutOfBounds` if the stored
    /// lengths point outside the page.
    pub fn get_key(&self, idx: u16) -> Result<&[u8], Error> {
        self.check_slot(idx, "Key")?;
        let pos = self.kv_pos(idx)?;
        let (klen, _) = self.kv_lens(pos)?;
        self.slice_at(pos + KV_HEADER_SIZE, klen)
    }

    /// Returns the value of entry `idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if `idx >= nkeys`, `Error::OutOfBounds` if the stored
    /// lengths point outside the page.
    pub fn get_val(&self, idx: u16) -> Result<&[u8], Error> {
        self.check_slot(idx, "Value")?;
        let pos = self.kv_pos(idx)?;
        let (klen, vlen) = self.kv_lens(pos)?;
        self.slice_at(pos + KV_HEADER_SIZE + klen, vlen)
    }

    /// Returns the number of bytes used by this node, i.e. the end of its last entry.
    ///
    /// Callers compare it against the page size to decide when a node has to be split.
    pub fn nbytes(&self) -> Result<usize, Error> {
        self.kv_pos(self.nkeys())
    }

    fn kv_lens(&self, pos: usize) -> Result<(usize, usize), Error> {
        let klen = u16::from_le_bytes(self.array_at(pos)?);
        let vlen = u16::from_le_bytes(self.array_at(pos + KEY_LEN_SIZE)?);
        Ok((klen as usize, vlen as usize))
    }

    // Appending

    /// Writes slot `idx`: its pointer, its packed entry and the offset following it.
    ///
    /// Slots have to be appended in ascending order after the header is set, because the entry
    /// is placed at the offset left by the previous one.
    ///
    /// # Errors
    /// - `Error::TooLarge` if the key or value exceeds the configured maximum.
    /// - `Error::IndexOutOfRange` if `idx >= nkeys`.
    /// - `Error::PageFull` if the entry would end beyond the page.
    pub fn append_kv(&mut self, idx: u16, ptr: u64, key: &[u8], val: &[u8]) -> Result<(), Error> {
        if key.len() > self.config.max_key_size() {
            return Err(err!(
                TooLarge,
                "Key of {} bytes exceeds the maximum of {}",
                key.len(),
                self.config.max_key_size()
            ));
        }
        if val.len() > self.config.max_val_size() {
            return Err(err!(
                TooLarge,
                "Value of {} bytes exceeds the maximum of {}",
                val.len(),
                self.config.max_val_size()
            ));
        }
        self.check_slot(idx, "Entry")?;

        let pos = self.kv_pos(idx)?;
        let size = PageConfig::entry_size(key.len(), val.len());
        if pos + size > self.data.len() {
            return Err(err!(
                PageFull,
                "Entry {} needs bytes {}..{}, page size is {}",
                idx,
                pos,
                pos + size,
                self.data.len()
            ));
        }
        let end = u16::try_from(pos + size - PageConfig::kv_area_start(self.nkeys() as usize))
            .map_err(|_| err!(PageFull, "Entry {} ends beyond the offset range", idx))?;

        self.set_ptr(idx, ptr)?;
        let entry = self.slice_at_mut(pos, size)?;
        entry[..KEY_LEN_SIZE].copy_from_slice(&(key.len() as u16).to_le_bytes());
        entry[KEY_LEN_SIZE..KV_HEADER_SIZE].copy_from_slice(&(val.len() as u16).to_le_bytes());
        entry[KV_HEADER_SIZE..KV_HEADER_SIZE + key.len()].copy_from_slice(key);
        entry[KV_HEADER_SIZE + key.len()..].copy_from_slice(val);
        self.set_offset(idx + 1, end)?;

        trace!(idx, ptr, klen = key.len(), vlen = val.len(), end, "Appended entry");
        Ok(())
    }

    /// Copies `n` consecutive slots of `src`, starting at `src_idx`, into this node at `dst_idx`.
    ///
    /// # Errors
    /// Returns `Error::IndexOutOfRange` if either range exceeds its node's keys, or any error of
    /// [`Node::append_kv`].
    pub fn append_range(
        &mut self,
        src: &Node,
        dst_idx: u16,
        src_idx: u16,
        n: u16,
    ) -> Result<(), Error> {
        if src_idx as u32 + n as u32 > src.nkeys() as u32 {
            return Err(err!(
                IndexOutOfRange,
                "Source range {}..{} exceeds nkeys {}",
                src_idx,
                src_idx as u32 + n as u32,
                src.nkeys()
            ));
        }
        if dst_idx as u32 + n as u32 > self.nkeys() as u32 {
            return Err(err!(
                IndexOutOfRange,
                "Destination range {}..{} exceeds nkeys {}",
                dst_idx,
                dst_idx as u32 + n as u32,
                self.nkeys()
            ));
        }
        for i in 0..n {
            self.append_kv(
                dst_idx + i,
                src.get_ptr(src_idx + i)?,
                src.get_key(src_idx + i)?,
                src.get_val(src_idx + i)?,
            )?;
        }
        trace!(dst_idx, src_idx, n, "Appended range");
        Ok(())
    }

    /// Returns the number of unused bytes after the last entry.
    pub fn free_space(&self) -> Result<usize, Error> {
        Ok(self.data.len().saturating_sub(self.nbytes()?))
    }

    /// Checks whether the node would still fit its page after growing by one slot holding an
    /// entry with the given key and value lengths.
    pub fn fits(&self, key_len: usize, val_len: usize) -> Result<bool, Error> {
        let grown =
            self.nbytes()? + POINTER_SIZE + OFFSET_SIZE + PageConfig::entry_size(key_len, val_len);
        Ok(grown <= self.data.len())
    }

    // Validation

    /// Checks the whole node eagerly: known node type, regions within the page, increasing
    /// offsets matching the lengths stored in each entry.
    ///
    /// The accessors above trust the page content; this is for pages of unknown provenance.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_layout().inspect_err(|e| {
            warn!(
                btype = self.btype(),
                nkeys = self.nkeys(),
                "Invalid node. {}",
                e
            )
        })
    }

    fn check_layout(&self) -> Result<(), Error> {
        self.node_type()?;
        let nkeys = self.nkeys();
        let kv_start = PageConfig::kv_area_start(nkeys as usize);
        if kv_start > self.data.len() {
            return Err(err!(
                Corrupted,
                "{} keys need {} bytes before the first entry, page size is {}",
                nkeys,
                kv_start,
                self.data.len()
            ));
        }

        let mut prev = 0usize;
        for idx in 1..=nkeys {
            let offset = self.get_offset(idx)? as usize;
            if offset < prev {
                return Err(err!(
                    Corrupted,
                    "Offset {} of entry {} is below the previous offset {}",
                    offset,
                    idx,
                    prev
                ));
            }
            if kv_start + offset > self.data.len() {
                return Err(err!(
                    Corrupted,
                    "Entry {} ends at {}, page size is {}",
                    idx - 1,
                    kv_start + offset,
                    self.data.len()
                ));
            }
            let (klen, vlen) = self.kv_lens(kv_start + prev)?;
            if klen > self.config.max_key_size() || vlen > self.config.max_val_size() {
                return Err(err!(
                    Corrupted,
                    "Entry {} has a {}-byte key and a {}-byte value",
                    idx - 1,
                    klen,
                    vlen
                ));
            }
            if PageConfig::entry_size(klen, vlen) != offset - prev {
                return Err(err!(
                    Corrupted,
                    "Entry {} occupies {} bytes, its lengths say {}",
                    idx - 1,
                    offset - prev,
                    PageConfig::entry_size(klen, vlen)
                ));
            }
            prev = offset;
        }
        Ok(())
    }

    // Helpers

    fn check_slot(&self, idx: u16, what: &str) -> Result<(), Error> {
        let nkeys = self.nkeys();
        if idx >= nkeys {
            return Err(err!(
                IndexOutOfRange,
                "{} index {} exceeds nkeys {}",
                what,
                idx,
                nkeys
            ));
        }
        Ok(())
    }

    /// Helper method to safely slice the data buffer immutably.
    fn slice_at(&self, offset: usize, size: usize) -> Result<&[u8], Error> {
        let end = self.checked_end(offset, size)?;
        Ok(&self.data[offset..end])
    }

    /// Helper method to safely slice the data buffer mutably.
    fn slice_at_mut(&mut self, offset: usize, size: usize) -> Result<&mut [u8], Error> {
        let end = self.checked_end(offset, size)?;
        Ok(&mut self.data[offset..end])
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], Error> {
        self.slice_at(offset, N)?
            .try_into()
            .map_err(|e| err!(OutOfBounds, "Failed to decode {} bytes at {}: {:?}", N, offset, e))
    }

    fn checked_end(&self, offset: usize, size: usize) -> Result<usize, Error> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(end),
            _ => Err(err!(
                OutOfBounds,
                "Range {}+{} exceeds buffer size {}",
                offset,
                size,
                self.data.len()
            )),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("btype", &self.btype())
            .field("nkeys", &self.nkeys())
            .field("page_size", &self.data.len())
            .finish()
    }
}

impl From<NodeType> for u16 {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Internal => BNODE_INTERNAL,
            NodeType::Leaf => BNODE_LEAF,
        }
    }
}

impl TryFrom<u16> for NodeType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            BNODE_INTERNAL => Ok(NodeType::Internal),
            BNODE_LEAF => Ok(NodeType::Leaf),
            invalid => Err(err!(Corrupted, "Invalid node type: {}", invalid)),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Internal => write!(f, "Internal"),
            NodeType::Leaf => write!(f, "Leaf"),
        }
    }
}
