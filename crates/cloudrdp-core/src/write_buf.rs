use std::ops::{Index, Range, RangeFrom, RangeFull, RangeTo};

/// Capacity kept for the inner `Vec<u8>` when `WriteBuf::clear` is called.
const MAX_CAPACITY_WHEN_CLEARED: usize = 16384;

/// Growable buffer backed by a [`Vec<u8>`] that is incrementally filled.
///
/// Tracks the filled region and hands out slices of the unfilled region,
/// growing the backing storage as required:
///
/// ```not_rust
/// [          Vec capacity             ]
/// [ filled | unfilled |               ]
/// ```
#[derive(Debug, Default)]
pub struct WriteBuf {
    inner: Vec<u8>,
    filled: usize,
}

impl WriteBuf {
    /// Constructs a new, empty `WriteBuf`.
    pub const fn new() -> Self {
        Self {
            inner: Vec::new(),
            filled: 0,
        }
    }

    /// Length of the filled region.
    pub const fn filled_len(&self) -> usize {
        self.filled
    }

    /// Shared reference to the filled portion of the buffer.
    pub fn filled(&self) -> &[u8] {
        &self.inner[..self.filled]
    }

    /// Mutable reference to the first `n` bytes of the unfilled part,
    /// allocating additional memory as necessary.
    pub fn unfilled_to(&mut self, n: usize) -> &mut [u8] {
        if self.inner.len() < self.filled + n {
            self.inner.resize(self.filled + n, 0);
        }
        &mut self.inner[self.filled..self.filled + n]
    }

    pub fn write_slice(&mut self, slice: &[u8]) {
        self.unfilled_to(slice.len()).copy_from_slice(slice);
        self.filled += slice.len();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_slice(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_slice(&value.to_le_bytes());
    }

    /// Consumes the buffer, returning the filled region as a `Vec<u8>`.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.inner.truncate(self.filled);
        self.inner
    }

    /// Resets the filled cursor to the beginning of the buffer.
    ///
    /// If the buffer grew big, it is shrunk in order to reclaim memory.
    pub fn clear(&mut self) {
        self.filled = 0;
        self.inner.shrink_to(MAX_CAPACITY_WHEN_CLEARED);
    }

    /// Advances the filled cursor by `len` bytes.
    pub fn advance(&mut self, len: usize) {
        self.filled += len;
        debug_assert!(self.filled <= self.inner.len());
    }
}

// Slicing into the filled region (e.g.: buf[..], buf[2..8]).

impl Index<Range<usize>> for WriteBuf {
    type Output = [u8];

    fn index(&self, range: Range<usize>) -> &Self::Output {
        &self.filled()[range]
    }
}

impl Index<RangeFrom<usize>> for WriteBuf {
    type Output = [u8];

    fn index(&self, range: RangeFrom<usize>) -> &Self::Output {
        &self.filled()[range]
    }
}

impl Index<RangeTo<usize>> for WriteBuf {
    type Output = [u8];

    fn index(&self, range: RangeTo<usize>) -> &Self::Output {
        &self.filled()[range]
    }
}

impl Index<RangeFull> for WriteBuf {
    type Output = [u8];

    fn index(&self, _: RangeFull) -> &Self::Output {
        self.filled()
    }
}
