//! Multi-get responses and their backing storage
//!
//! A multi-get response holds one optional record per requested key. Record
//! values either borrow memory owned by the caller (for the response's
//! lifetime `'a`) or point into blocks of the response's own arena. The arena
//! is owned by exactly one response and freed with it as a unit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Payload alignment of arena blocks
pub const STORAGE_ALIGN: usize = 8;

static NEXT_ARENA: AtomicU64 = AtomicU64::new(1);

/// Handle to one block of a response's arena.
///
/// A handle only resolves against the arena that issued it; any other arena
/// treats it as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageId {
    arena: u64,
    index: usize,
}

/// Arena of value blocks backing a multi-get response
pub struct MGetStorage {
    arena: u64,
    blocks: Vec<Box<[u8]>>,
}

impl Default for MGetStorage {
    fn default() -> Self {
        Self {
            arena: NEXT_ARENA.fetch_add(1, Ordering::Relaxed),
            blocks: Vec::new(),
        }
    }
}

impl MGetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed block able to hold `size` payload bytes.
    /// Capacity is rounded up to a multiple of [`STORAGE_ALIGN`].
    pub fn alloc(&mut self, size: usize) -> StorageId {
        let capacity = size.div_ceil(STORAGE_ALIGN) * STORAGE_ALIGN;
        self.push_block(vec![0u8; capacity])
    }

    /// Allocate a block holding a copy of `value`
    pub fn alloc_copy(&mut self, value: &[u8]) -> StorageId {
        let capacity = value.len().div_ceil(STORAGE_ALIGN) * STORAGE_ALIGN;
        let mut block = Vec::with_capacity(capacity);
        block.extend_from_slice(value);
        block.resize(capacity, 0);
        self.push_block(block)
    }

    fn push_block(&mut self, block: Vec<u8>) -> StorageId {
        self.blocks.push(block.into_boxed_slice());
        StorageId {
            arena: self.arena,
            index: self.blocks.len() - 1,
        }
    }

    /// The block behind `id`, `None` if `id` was issued by another arena
    pub fn block(&self, id: StorageId) -> Option<&[u8]> {
        if id.arena != self.arena {
            return None;
        }
        self.blocks.get(id.index).map(|b| &b[..])
    }

    pub fn block_mut(&mut self, id: StorageId) -> Option<&mut [u8]> {
        if id.arena != self.arena {
            return None;
        }
        self.blocks.get_mut(id.index).map(|b| &mut b[..])
    }

    /// Whether `id` was issued by this arena
    pub fn owns(&self, id: StorageId) -> bool {
        id.arena == self.arena && id.index < self.blocks.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total capacity of all blocks, in bytes
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }
}

impl fmt::Debug for MGetStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MGetStorage")
            .field("blocks", &self.blocks.len())
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Repr<'a> {
    Borrowed(&'a [u8]),
    Stored { id: StorageId, len: usize },
}

/// View of a record's value
#[derive(Debug, Clone, Copy)]
pub struct ValueRef<'a>(Repr<'a>);

impl<'a> ValueRef<'a> {
    /// Reference caller-owned bytes that outlive the response
    pub fn borrowed(value: &'a [u8]) -> Self {
        ValueRef(Repr::Borrowed(value))
    }

    pub fn len(&self) -> usize {
        match self.0 {
            Repr::Borrowed(value) => value.len(),
            Repr::Stored { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value lives in the response's arena
    pub fn is_stored(&self) -> bool {
        matches!(self.0, Repr::Stored { .. })
    }
}

impl<'a> From<&'a [u8]> for ValueRef<'a> {
    fn from(value: &'a [u8]) -> Self {
        ValueRef::borrowed(value)
    }
}

impl<'a> From<&'a str> for ValueRef<'a> {
    fn from(value: &'a str) -> Self {
        ValueRef::borrowed(value.as_bytes())
    }
}

/// One found key
#[derive(Debug, Clone)]
pub struct GetResp<'a> {
    pub key: String,
    pub value: ValueRef<'a>,
    /// Memcached cas-unique token; 0 means it was not requested
    pub mc_ver: u64,
    /// Memcached client flags
    pub mc_flag: u32,
}

impl<'a> GetResp<'a> {
    pub fn new(key: impl Into<String>, value: impl Into<ValueRef<'a>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            mc_ver: 0,
            mc_flag: 0,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.mc_flag = flags;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.mc_ver = version;
        self
    }
}

/// Ordered records for a multi-key fetch, `None` for keys that were not found.
///
/// Not `Clone`: the arena has a single owner. `std::mem::take` moves the
/// contents out and leaves an empty response behind.
#[derive(Debug, Default)]
pub struct MGetResponse<'a> {
    storage: MGetStorage,
    resp_arr: Vec<Option<GetResp<'a>>>,
}

impl<'a> MGetResponse<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response with `len` absent records
    pub fn with_len(len: usize) -> Self {
        let mut resp_arr = Vec::with_capacity(len);
        resp_arr.resize_with(len, || None);
        Self {
            storage: MGetStorage::new(),
            resp_arr,
        }
    }

    pub fn push(&mut self, entry: Option<GetResp<'a>>) {
        self.resp_arr.push(entry);
    }

    /// Replace the record at `index`. Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, entry: GetResp<'a>) {
        self.resp_arr[index] = Some(entry);
    }

    /// Allocate an arena block linked to this response
    pub fn alloc_storage(&mut self, size: usize) -> StorageId {
        self.storage.alloc(size)
    }

    /// Writable block `id`, `None` if it belongs to another response
    pub fn storage_mut(&mut self, id: StorageId) -> Option<&mut [u8]> {
        self.storage.block_mut(id)
    }

    pub fn storage(&self) -> &MGetStorage {
        &self.storage
    }

    /// View of the first `len` bytes of block `id`, `None` if the block is
    /// smaller than `len` or belongs to another response
    pub fn stored_value(&self, id: StorageId, len: usize) -> Option<ValueRef<'a>> {
        let block = self.storage.block(id)?;
        (len <= block.len()).then_some(ValueRef(Repr::Stored { id, len }))
    }

    /// Copy `value` into a new arena block and return a view of it
    pub fn copy_value(&mut self, value: &[u8]) -> ValueRef<'a> {
        let id = self.storage.alloc_copy(value);
        ValueRef(Repr::Stored { id, len: value.len() })
    }

    pub fn len(&self) -> usize {
        self.resp_arr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resp_arr.is_empty()
    }

    /// Number of present records
    pub fn hits(&self) -> usize {
        self.resp_arr.iter().filter(|r| r.is_some()).count()
    }

    pub fn entries(&self) -> &[Option<GetResp<'a>>] {
        &self.resp_arr
    }

    /// Resolve a record's value to its bytes. `None` for a stored value
    /// whose block lives in another response's arena.
    pub fn value(&self, value: &ValueRef<'a>) -> Option<&[u8]> {
        match value.0 {
            Repr::Borrowed(bytes) => Some(bytes),
            Repr::Stored { id, len } => self.storage.block(id)?.get(..len),
        }
    }

    /// Records in key order, paired with their resolved bytes. A record whose
    /// value does not resolve is reported as missing.
    pub fn iter(&self) -> impl Iterator<Item = Option<(&GetResp<'a>, &[u8])>> + '_ {
        self.resp_arr.iter().map(move |entry| {
            let record = entry.as_ref()?;
            match self.value(&record.value) {
                Some(bytes) => Some((record, bytes)),
                None => {
                    tracing::warn!("Dropping value of key {} stored in a foreign arena", record.key);
                    None
                }
            }
        })
    }
}
