//! Boundary binary search over sorted binary records
//!
//! The search engine works on any byte buffer that stores `N` records sorted by
//! an unsigned little-endian key. Records can be interleaved (row layout, one
//! fixed-length block per record) or transposed into contiguous columns (column
//! layout). Both layouts reduce to the same address arithmetic:
//!
//! ```text
//! address(item) = stride * item + offset
//! ```
//!
//! where `stride` is the block length in row layout and the key width in column
//! layout, and `offset` is the key position inside the block or the column start.
//!
//! Searches locate the *boundary* of a run of equal keys rather than an arbitrary
//! match, and report absence as a position one past the searched range. Search
//! ranges are narrowed in place so that callers can reuse them.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, SearchError};

/// Byte width of a key field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWidth {
    U8,
    U16,
    U32,
    U64,
}
impl KeyWidth {
    /// Maps a byte count to a key width
    #[must_use]
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            4 => Some(Self::U32),
            8 => Some(Self::U64),
            _ => None,
        }
    }

    /// Number of bytes occupied by the key
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Number of bits occupied by the key
    #[must_use]
    pub const fn bits(self) -> u8 {
        (self.bytes() * 8) as u8
    }
}

/// Location and shape of the key that records are sorted by
///
/// A field is selected once, when a table is opened, and then drives every read
/// of the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
    /// Byte position of the key of item 0
    offset: u64,
    /// Distance in bytes between the keys of two consecutive items
    stride: u64,
    /// Width of the stored key
    width: KeyWidth,
    /// Optional inclusive bit range, counted from the most significant bit of the key
    bits: Option<(u8, u8)>,
}

impl KeyField {
    /// Key stored inside fixed-length blocks
    ///
    /// # Arguments
    ///
    /// * `blklen` - Length of each record block in bytes
    /// * `blkpos` - Position of the key inside the block
    /// * `width` - Width of the key
    #[must_use]
    pub const fn row(blklen: u64, blkpos: u64, width: KeyWidth) -> Self {
        Self {
            offset: blkpos,
            stride: blklen,
            width,
            bits: None,
        }
    }

    /// Key stored as a contiguous column starting at `offset`
    #[must_use]
    pub const fn column(offset: u64, width: KeyWidth) -> Self {
        Self {
            offset,
            stride: width.bytes(),
            width,
            bits: None,
        }
    }

    /// Restricts comparisons to the bits `start..=end` of the key
    ///
    /// Bits are counted from the most significant bit of the stored width, so
    /// `with_bits(0, 32)` on a 64-bit key compares the top 33 bits.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidBitRange` if `start > end` or `end` lies
    /// outside the key width.
    pub fn with_bits(self, start: u8, end: u8) -> Result<Self> {
        let bits = self.width.bits();
        if start > end || end >= bits {
            return Err(SearchError::InvalidBitRange { start, end, bits }.into());
        }
        Ok(Self {
            bits: Some((start, end)),
            ..self
        })
    }

    /// Byte address of the key of the given item
    #[must_use]
    pub const fn address(&self, item: u64) -> u64 {
        self.stride * item + self.offset
    }

    #[must_use]
    pub const fn width(&self) -> KeyWidth {
        self.width
    }

    #[must_use]
    pub const fn stride(&self) -> u64 {
        self.stride
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Extracts the compared portion of a raw key value
    #[inline]
    fn select(&self, value: u64) -> u64 {
        match self.bits {
            None => value,
            Some((start, end)) => {
                let lshift = 64 - u32::from(self.width.bits()) + u32::from(start);
                let rshift = 63 - u32::from(end) + u32::from(start);
                (value << lshift) >> rshift
            }
        }
    }
}

/// Inclusive range of item positions
///
/// Search functions narrow the range in place while they run, so on return it
/// carries the bounds discovered by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    pub first: u64,
    pub last: u64,
}
impl SearchRange {
    #[must_use]
    pub const fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// Range covering all `nrows` items, or `None` when there are none
    #[must_use]
    pub fn all(nrows: u64) -> Option<Self> {
        nrows.checked_sub(1).map(|last| Self::new(0, last))
    }
}

/// Binary search over a sorted byte buffer
#[derive(Debug, Clone, Copy)]
pub struct BinSearch<'a> {
    src: &'a [u8],
    field: KeyField,
}

impl<'a> BinSearch<'a> {
    #[must_use]
    pub const fn new(src: &'a [u8], field: KeyField) -> Self {
        Self { src, field }
    }

    #[must_use]
    pub const fn field(&self) -> &KeyField {
        &self.field
    }

    /// Reads the raw stored key of an item
    ///
    /// # Panics
    ///
    /// Panics if the key of `item` lies outside the buffer.
    #[inline]
    #[must_use]
    pub fn raw(&self, item: u64) -> u64 {
        let addr = self.field.address(item) as usize;
        match self.field.width {
            KeyWidth::U8 => u64::from(self.src[addr]),
            KeyWidth::U16 => u64::from(LittleEndian::read_u16(&self.src[addr..addr + 2])),
            KeyWidth::U32 => u64::from(LittleEndian::read_u32(&self.src[addr..addr + 4])),
            KeyWidth::U64 => LittleEndian::read_u64(&self.src[addr..addr + 8]),
        }
    }

    /// Reads the compared key of an item (the bit range if one is configured)
    ///
    /// # Panics
    ///
    /// Panics if the key of `item` lies outside the buffer.
    #[inline]
    #[must_use]
    pub fn get(&self, item: u64) -> u64 {
        self.field.select(self.raw(item))
    }

    /// Finds the first item in `range` whose key equals `search`
    ///
    /// # Returns
    ///
    /// The position of the first match, or the original `range.last + 1` if
    /// there is none. In both cases `range.first` ends at the lower-bound
    /// insertion point of `search`.
    pub fn find_first(&self, range: &mut SearchRange, search: u64) -> u64 {
        let mut found = range.last.saturating_add(1);
        while range.first <= range.last {
            let middle = range.first + ((range.last - range.first) >> 1);
            match self.get(middle).cmp(&search) {
                Ordering::Equal => {
                    if middle == 0 {
                        return middle;
                    }
                    found = middle;
                    range.last = middle - 1;
                }
                Ordering::Less => range.first = middle + 1,
                Ordering::Greater => {
                    if middle == 0 {
                        return found;
                    }
                    range.last = middle - 1;
                }
            }
        }
        found
    }

    /// Finds the last item in `range` whose key equals `search`
    ///
    /// # Returns
    ///
    /// The position of the last match, or the original `range.last + 1` if
    /// there is none. Unless every key in the range is greater than `search`,
    /// `range.last` ends at the last position holding a key `<= search`.
    pub fn find_last(&self, range: &mut SearchRange, search: u64) -> u64 {
        let mut found = range.last.saturating_add(1);
        while range.first <= range.last {
            let middle = range.first + ((range.last - range.first) >> 1);
            match self.get(middle).cmp(&search) {
                Ordering::Equal => {
                    found = middle;
                    range.first = middle + 1;
                }
                Ordering::Less => range.first = middle + 1,
                Ordering::Greater => {
                    if middle == 0 {
                        return found;
                    }
                    range.last = middle - 1;
                }
            }
        }
        found
    }

    /// Steps `pos` forward and checks that the next item still matches
    ///
    /// Returns `false` without moving when `pos` is already at `last`.
    pub fn has_next(&self, pos: &mut u64, last: u64, search: u64) -> bool {
        if *pos >= last {
            return false;
        }
        *pos += 1;
        self.get(*pos) == search
    }

    /// Steps `pos` backward and checks that the previous item still matches
    ///
    /// Returns `false` without moving when `pos` is already at `first`.
    pub fn has_prev(&self, first: u64, pos: &mut u64, search: u64) -> bool {
        if *pos <= first {
            return false;
        }
        *pos -= 1;
        self.get(*pos) == search
    }
}
