//! The linear memory block shared between the orchestrator and every worker.
//!
//! A [`SharedMemoryHandle`] is allocated exactly once per bootstrap and handed to each worker's
//! `init` call. Handing it over bumps a reference count; the underlying words are never copied,
//! so every holder observes the same [`MemoryId`] and the same [`MemoryLayout`].
//!
//! The orchestrator and the RPC transport treat the contents as opaque. Only the compute module's
//! lanes read or write the words, each lane touching a disjoint range.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::foundation::error::{RayportError, RayportResult};

/// Size of one memory page in bytes.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Pages allocated when a worker is initialized without a pre-allocated handle.
pub const DEFAULT_PAGES: u32 = 256;

/// Largest accepted page count (1 GiB).
pub const MAX_PAGES: u32 = 16 * 1024;

const WORD_SIZE: usize = std::mem::size_of::<u32>();

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one allocated memory block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryId(pub u64);

/// Size and shape of a memory block. Identical for every holder of the same handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Number of [`PAGE_SIZE`] pages.
    pub pages: u32,
}

impl MemoryLayout {
    /// Validate a page count and build the layout.
    pub fn new(pages: u32) -> RayportResult<Self> {
        if pages == 0 {
            return Err(RayportError::validation("shared memory must have >= 1 page"));
        }
        if pages > MAX_PAGES {
            return Err(RayportError::validation(format!(
                "shared memory pages must be <= {MAX_PAGES} (got {pages})"
            )));
        }
        Ok(Self { pages })
    }

    /// Smallest layout whose words hold one frame of `pixels` pixels, one word per pixel.
    pub fn for_pixels(pixels: usize) -> RayportResult<Self> {
        let words_per_page = PAGE_SIZE / WORD_SIZE;
        let pages = pixels.div_ceil(words_per_page).max(1);
        match u32::try_from(pages) {
            Ok(pages) if pages <= MAX_PAGES => Ok(Self { pages }),
            _ => Err(RayportError::validation(format!(
                "frame of {pixels} pixels needs {pages} pages of shared memory, \
                 more than the maximum of {MAX_PAGES}"
            ))),
        }
    }

    /// Total size in bytes.
    pub fn byte_len(self) -> usize {
        self.pages as usize * PAGE_SIZE
    }

    /// Total size in 32-bit words.
    pub fn word_len(self) -> usize {
        self.byte_len() / WORD_SIZE
    }
}

struct SharedMemory {
    id: MemoryId,
    layout: MemoryLayout,
    words: Box<[AtomicU32]>,
}

/// Reference to a shared linear memory block.
///
/// Deliberately not `Clone`: the only way to obtain a second reference is the crate-internal
/// [`SharedMemoryHandle::share`], used when marshaling a worker's `init` call.
pub struct SharedMemoryHandle(Arc<SharedMemory>);

impl SharedMemoryHandle {
    /// Allocate a zeroed block of `pages` pages.
    pub fn allocate(pages: u32) -> RayportResult<Self> {
        let layout = MemoryLayout::new(pages)?;
        let words = (0..layout.word_len())
            .map(|_| AtomicU32::new(0))
            .collect::<Box<[_]>>();
        let id = MemoryId(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(memory = id.0, pages, "allocated shared memory");
        Ok(Self(Arc::new(SharedMemory { id, layout, words })))
    }

    pub(crate) fn share(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Identity of the underlying block.
    pub fn id(&self) -> MemoryId {
        self.0.id
    }

    /// Layout of the underlying block.
    pub fn layout(&self) -> MemoryLayout {
        self.0.layout
    }

    /// The block as 32-bit words.
    pub fn words(&self) -> &[AtomicU32] {
        &self.0.words
    }

    /// Return `true` when both handles refer to the same block.
    pub fn same_block(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles referring to this block.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for SharedMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryHandle")
            .field("id", &self.0.id)
            .field("pages", &self.0.layout.pages)
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/unit/memory/shared.rs"]
mod tests;
