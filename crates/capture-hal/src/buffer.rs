//! Capture buffer allocation contract.
//!
//! Transfers land in fixed-size segments drawn from a memory pool the
//! application owns. The pool internals are out of scope here; the capture
//! core only needs an allocate/free pair and an opaque ownership token.
//!
//! Ownership of a [`BufferHandle`] moves with the data: the capture core owns
//! it from allocation until the matching DMA completion, at which point it is
//! handed to the caller's sink inside a `CaptureDone`. The sink is then
//! responsible for returning it via [`BufferPool::free`].

use thiserror_no_std::Error;

/// Identifier of one application-owned memory pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemPoolId(u8);

impl MemPoolId {
    /// Wrap a raw pool number.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw pool number.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Opaque ownership token for one allocated segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferHandle {
    pool: MemPoolId,
    address: u32,
    len_bytes: usize,
}

impl BufferHandle {
    /// Construct a handle. Only pool implementations should call this.
    #[must_use]
    pub const fn new(pool: MemPoolId, address: u32, len_bytes: usize) -> Self {
        Self {
            pool,
            address,
            len_bytes,
        }
    }

    /// Pool the segment was drawn from.
    #[must_use]
    pub const fn pool(self) -> MemPoolId {
        self.pool
    }

    /// Physical address of the segment, as handed to the DMA engine.
    #[must_use]
    pub const fn address(self) -> u32 {
        self.address
    }

    /// Segment length in bytes.
    #[must_use]
    pub const fn len_bytes(self) -> usize {
        self.len_bytes
    }
}

/// Allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// The pool has no free segment large enough.
    #[error("buffer pool exhausted")]
    Exhausted,
    /// The pool id is not known to this allocator.
    #[error("unknown memory pool")]
    UnknownPool,
}

/// Fixed-segment allocator backing capture transfers.
pub trait BufferPool: Sync {
    /// Allocate a segment of at least `len_bytes` from `pool`.
    fn alloc(&self, pool: MemPoolId, len_bytes: usize) -> Result<BufferHandle, AllocError>;

    /// Return a segment to its pool.
    fn free(&self, handle: BufferHandle);
}
