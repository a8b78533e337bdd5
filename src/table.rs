//! Self-describing container for sorted lookup tables
//!
//! NRVK, RV and VR tables share one on-disk container. It has a fixed 64-byte
//! header, followed by the absolute byte address of the first field of every
//! column, followed by the records:
//!
//! ```text
//! [TableHeader; 64 bytes][u64 column address; ncols][records][blob]
//! ```
//!
//! Records are stored either interleaved ([`Layout::Row`]) or transposed into
//! contiguous columns ([`Layout::Column`]). The header carries the byte width of
//! every column, which is all the search engine needs to address a field in
//! either layout. All integers are little-endian.

use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use bytemuck::{Pod, Zeroable};

use crate::binsearch::{BinSearch, KeyField, KeyWidth, SearchRange};
use crate::error::{HeaderError, ReadError, Result};
use crate::mmap::MappedFile;

/// Table file magic number
pub const TABLE_MAGIC: &[u8; 7] = b"VKTABLE";

/// Table file format version
pub const TABLE_VERSION: u8 = 1;

/// Size of the table header in bytes
pub const SIZE_TABLE_HEADER: usize = size_of::<TableHeader>();

/// Maximum number of columns a header can describe
pub const MAX_COLUMNS: usize = 5;

/// Content stored in a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TableKind {
    /// Non-reversible VariantKey to ref/alt strings
    Nrvk = 1,
    /// rsID to VariantKey, sorted by rsID
    Rv = 2,
    /// VariantKey to rsID, sorted by VariantKey
    Vr = 3,
}
impl TableKind {
    #[must_use]
    pub fn from_u8(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(Self::Nrvk),
            2 => Some(Self::Rv),
            3 => Some(Self::Vr),
            _ => None,
        }
    }

    /// Byte widths of the columns of this kind of table
    ///
    /// The first column is the sort key.
    #[must_use]
    pub const fn column_widths(self) -> &'static [u8] {
        match self {
            Self::Nrvk => &[8, 8],
            Self::Rv => &[4, 8],
            Self::Vr => &[8, 4],
        }
    }

    /// Whether the table carries a variable-length payload after the records
    #[must_use]
    pub const fn has_blob(self) -> bool {
        matches!(self, Self::Nrvk)
    }
}

/// Arrangement of record fields in a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Layout {
    /// One fixed-length block per record
    #[default]
    Row = 0,
    /// One contiguous array per column
    Column = 1,
}
impl Layout {
    #[must_use]
    pub fn from_u8(layout: u8) -> Option<Self> {
        match layout {
            0 => Some(Self::Row),
            1 => Some(Self::Column),
            _ => None,
        }
    }
}

/// Fixed-size header at the start of every table file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct TableHeader {
    // File Type Metadata (8 bytes)
    /// File magic number
    magic: [u8; 7],
    /// File version number
    pub version: u8,

    // Table shape (8 bytes)
    /// Table kind, see [`TableKind`]
    pub kind: u8,
    /// Record layout, see [`Layout`]
    pub layout: u8,
    /// Number of columns
    pub ncols: u8,
    /// Byte width of each column, unused entries are zero
    pub widths: [u8; MAX_COLUMNS],

    // Extents (16 bytes)
    /// Number of records
    pub nrows: u64,
    /// Absolute byte position of the variable-length payload, 0 if absent
    pub blob_offset: u64,

    /// Reserved for future use
    reserved: [u8; 32],
}

impl TableHeader {
    fn new(kind: TableKind, layout: Layout, nrows: u64, blob_offset: u64) -> Self {
        let columns = kind.column_widths();
        let mut widths = [0; MAX_COLUMNS];
        widths[..columns.len()].copy_from_slice(columns);
        Self {
            magic: *TABLE_MAGIC,
            version: TABLE_VERSION,
            kind: kind as u8,
            layout: layout as u8,
            ncols: columns.len() as u8,
            widths,
            nrows,
            blob_offset,
            reserved: [0; 32],
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads and validates the magic number and version of a header
    ///
    /// # Errors
    ///
    /// Returns `ReadError::FileTruncation` if the buffer is shorter than a header,
    /// `HeaderError::InvalidMagic` or `HeaderError::InvalidFormatVersion` otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(buffer) = bytes.get(..SIZE_TABLE_HEADER) else {
            return Err(ReadError::FileTruncation(SIZE_TABLE_HEADER).into());
        };
        let header: Self = bytemuck::pod_read_unaligned(buffer);
        if header.magic != *TABLE_MAGIC {
            return Err(
                HeaderError::InvalidMagic(String::from_utf8_lossy(&header.magic).into_owned())
                    .into(),
            );
        }
        if header.version != TABLE_VERSION {
            return Err(HeaderError::InvalidFormatVersion(header.version).into());
        }
        Ok(header)
    }

    /// Checks that the header describes a table of the expected kind
    fn validate(&self, kind: TableKind) -> Result<Layout> {
        if self.kind != kind as u8 {
            return Err(HeaderError::UnexpectedKind {
                expected: kind as u8,
                found: self.kind,
            }
            .into());
        }
        let Some(layout) = Layout::from_u8(self.layout) else {
            return Err(HeaderError::InvalidLayout(self.layout).into());
        };
        let expected = kind.column_widths();
        if usize::from(self.ncols) != expected.len() {
            return Err(HeaderError::InvalidColumnCount {
                expected: expected.len() as u8,
                found: self.ncols,
            }
            .into());
        }
        for (col, (&width, &exp)) in self.widths.iter().zip(expected).enumerate() {
            if width != exp {
                return Err(HeaderError::InvalidColumnWidth(col, width).into());
            }
        }
        Ok(layout)
    }

    /// Column widths as search key widths
    fn key_widths(&self) -> impl Iterator<Item = KeyWidth> + '_ {
        self.widths[..usize::from(self.ncols)]
            .iter()
            .filter_map(|&w| KeyWidth::from_bytes(w))
    }

    /// Sum of the column widths
    fn record_size(&self) -> u64 {
        self.key_widths().map(KeyWidth::bytes).sum()
    }
}

/// A validated, memory-mapped table
///
/// Cloning a table shares the underlying mapping.
#[derive(Clone, Debug)]
pub struct Table {
    file: MappedFile,
    header: TableHeader,
    layout: Layout,
    fields: Vec<KeyField>,
}

impl Table {
    /// Memory-maps and validates a table file of the given kind
    pub fn open<P: AsRef<Path>>(path: P, kind: TableKind) -> Result<Self> {
        Self::from_file(MappedFile::open(path)?, kind)
    }

    /// Validates a table held in a mapped buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid, describes another kind of
    /// table, or if any column or the payload extends past the end of the buffer.
    pub fn from_file(file: MappedFile, kind: TableKind) -> Result<Self> {
        let header = TableHeader::from_bytes(&file)?;
        let layout = header.validate(kind)?;

        // Column address index
        let ncols = usize::from(header.ncols);
        let index_end = SIZE_TABLE_HEADER + ncols * size_of::<u64>();
        let Some(index) = file.get(SIZE_TABLE_HEADER..index_end) else {
            return Err(ReadError::FileTruncation(index_end).into());
        };

        let stride = header.record_size();
        let fields: Vec<KeyField> = header
            .key_widths()
            .zip(index.chunks_exact(size_of::<u64>()))
            .map(|(width, addr)| {
                let offset = LittleEndian::read_u64(addr);
                match layout {
                    Layout::Row => KeyField::row(stride, offset, width),
                    Layout::Column => KeyField::column(offset, width),
                }
            })
            .collect();

        // Immediately validate the extent of every column against the buffer size
        let len = file.len() as u64;
        if header.nrows > 0 {
            for field in &fields {
                let extent = field
                    .stride()
                    .checked_mul(header.nrows - 1)
                    .and_then(|x| x.checked_add(field.offset()))
                    .and_then(|x| x.checked_add(field.width().bytes()))
                    .unwrap_or(u64::MAX);
                if extent > len {
                    return Err(ReadError::FileTruncation(extent as usize).into());
                }
            }
        }
        if header.blob_offset > len {
            return Err(ReadError::FileTruncation(header.blob_offset as usize).into());
        }

        tracing::debug!(
            kind = ?kind,
            layout = ?layout,
            nrows = header.nrows,
            "opened table"
        );
        Ok(Self {
            file,
            header,
            layout,
            fields,
        })
    }

    /// Returns a copy of the table header
    #[must_use]
    pub fn header(&self) -> TableHeader {
        self.header
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the total number of records in the table
    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.header.nrows
    }

    /// Location of a column
    ///
    /// # Panics
    ///
    /// Panics if `col` is not a column of the table.
    #[must_use]
    pub fn field(&self, col: usize) -> KeyField {
        self.fields[col]
    }

    /// Search engine over a column
    ///
    /// # Panics
    ///
    /// Panics if `col` is not a column of the table.
    #[must_use]
    pub fn search(&self, col: usize) -> BinSearch<'_> {
        BinSearch::new(&self.file, self.fields[col])
    }

    /// Search engine over a field derived from one of the columns
    #[must_use]
    pub fn search_field(&self, field: KeyField) -> BinSearch<'_> {
        BinSearch::new(&self.file, field)
    }

    /// Raw value of a field
    ///
    /// # Panics
    ///
    /// Panics if `col` or `item` is out of range.
    #[must_use]
    pub fn value(&self, col: usize, item: u64) -> u64 {
        self.search(col).raw(item)
    }

    /// Clamps a caller-supplied range to the records of the table
    ///
    /// Returns `None` when the table is empty or the range selects nothing.
    #[must_use]
    pub fn clamp(&self, first: u64, last: u64) -> Option<SearchRange> {
        let all = SearchRange::all(self.header.nrows)?;
        let last = last.min(all.last);
        (first <= last).then(|| SearchRange::new(first, last))
    }

    /// Bytes of the variable-length payload starting at `offset`
    ///
    /// Returns `None` if the table has no payload or `offset` lies past its end.
    #[must_use]
    pub fn blob(&self, offset: u64) -> Option<&[u8]> {
        if self.header.blob_offset == 0 {
            return None;
        }
        let start = self.header.blob_offset.checked_add(offset)?;
        self.file.get(usize::try_from(start).ok()?..)
    }
}

/// Builder for table files
///
/// Rows may be pushed in any order. They are stably sorted by their first
/// column when the table is written, so duplicate keys keep their insertion
/// order.
#[derive(Debug, Clone)]
pub struct TableWriter {
    kind: TableKind,
    layout: Layout,
    rows: Vec<[u64; 2]>,
    blob: Vec<u8>,
}

impl TableWriter {
    #[must_use]
    pub fn new(kind: TableKind, layout: Layout) -> Self {
        Self {
            kind,
            layout,
            rows: Vec::new(),
            blob: Vec::new(),
        }
    }

    /// Number of rows pushed so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn push_row(&mut self, key: u64, value: u64) {
        self.rows.push([key, value]);
    }

    /// Appends bytes to the payload and returns their relative offset
    pub(crate) fn push_blob(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.blob.len() as u64;
        self.blob.extend_from_slice(bytes);
        offset
    }

    /// Writes the complete table and returns the number of bytes written
    pub fn write<W: Write>(mut self, inner: &mut W) -> Result<usize> {
        self.rows.sort_by_key(|row| row[0]);

        let widths: Vec<KeyWidth> = self
            .kind
            .column_widths()
            .iter()
            .filter_map(|&w| KeyWidth::from_bytes(w))
            .collect();
        let nrows = self.rows.len() as u64;
        let record_size: u64 = widths.iter().map(|w| w.bytes()).sum();
        let data_start = (SIZE_TABLE_HEADER + widths.len() * size_of::<u64>()) as u64;
        let data_end = data_start + nrows * record_size;
        let blob_offset = if self.kind.has_blob() { data_end } else { 0 };

        let header = TableHeader::new(self.kind, self.layout, nrows, blob_offset);
        inner.write_all(header.as_bytes())?;

        // Column addresses
        let mut preceding = 0;
        for width in &widths {
            let offset = match self.layout {
                Layout::Row => data_start + preceding,
                Layout::Column => data_start + nrows * preceding,
            };
            inner.write_u64::<LittleEndian>(offset)?;
            preceding += width.bytes();
        }

        match self.layout {
            Layout::Row => {
                for row in &self.rows {
                    for (value, width) in row.iter().zip(&widths) {
                        write_field(inner, *value, *width)?;
                    }
                }
            }
            Layout::Column => {
                for (col, width) in widths.iter().enumerate() {
                    for row in &self.rows {
                        write_field(inner, row[col], *width)?;
                    }
                }
            }
        }

        if self.kind.has_blob() {
            inner.write_all(&self.blob)?;
        }
        Ok((data_end as usize) + self.blob.len())
    }

    /// Writes the table into a new buffer
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_field<W: Write>(inner: &mut W, value: u64, width: KeyWidth) -> Result<()> {
    match width {
        KeyWidth::U8 => inner.write_u8(value as u8)?,
        KeyWidth::U16 => inner.write_u16::<LittleEndian>(value as u16)?,
        KeyWidth::U32 => inner.write_u32::<LittleEndian>(value as u32)?,
        KeyWidth::U64 => inner.write_u64::<LittleEndian>(value)?,
    }
    Ok(())
}
