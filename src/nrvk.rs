//! Lookup of REF and ALT alleles for non-reversible VariantKeys
//!
//! Variants with long or non-ACGT alleles are encoded with a hash, which cannot
//! be decoded. An NRVK table maps these VariantKeys back to their alleles. It is
//! a [`TableKind::Nrvk`] table with the sorted VariantKey in column 0 and the
//! position of the alleles inside the payload in column 1. Each payload entry is
//! stored as
//!
//! ```text
//! [ref_len: u8][alt_len: u8][ref bytes][alt bytes]
//! ```

use std::io::Write;
use std::path::Path;

use crate::error::{Result, WriteError};
use crate::mmap::MappedFile;
use crate::regionkey;
use crate::table::{Layout, Table, TableKind, TableWriter};
use crate::variantkey::{
    decode_chrom, decode_refalt, decode_variantkey, extract_variantkey_pos,
    extract_variantkey_refalt, is_reversible_refalt, reversible_ref_length, Variant,
    VKMASK_CHROM, VKSHIFT_POS,
};

const COL_VK: usize = 0;
const COL_OFFSET: usize = 1;

/// A memory-mapped NRVK table
#[derive(Clone, Debug)]
pub struct Nrvk {
    table: Table,
}

impl Nrvk {
    /// Memory-maps and validates an NRVK table file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            table: Table::open(path, TableKind::Nrvk)?,
        })
    }

    /// Loads an NRVK table held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_file(MappedFile::from_bytes(bytes)?)
    }

    pub fn from_file(file: MappedFile) -> Result<Self> {
        Ok(Self {
            table: Table::from_file(file, TableKind::Nrvk)?,
        })
    }

    /// Returns the total number of records in the table
    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.table.num_records()
    }

    /// Alleles stored for an item, `None` if the payload entry is out of bounds
    fn entry(&self, item: u64) -> Option<(&[u8], &[u8])> {
        let blob = self.table.blob(self.table.value(COL_OFFSET, item))?;
        let (&ref_len, rest) = blob.split_first()?;
        let (&alt_len, rest) = rest.split_first()?;
        let (ref_len, alt_len) = (usize::from(ref_len), usize::from(alt_len));
        let ref_allele = rest.get(..ref_len)?;
        let alt_allele = rest.get(ref_len..ref_len + alt_len)?;
        Some((ref_allele, alt_allele))
    }

    /// Position of the first record holding `vk`
    fn find(&self, vk: u64) -> Option<u64> {
        let mut range = self.table.clamp(0, u64::MAX)?;
        let last = range.last;
        let item = self.table.search(COL_VK).find_first(&mut range, vk);
        (item <= last).then_some(item)
    }

    /// Looks up the REF and ALT alleles of a VariantKey
    #[must_use]
    pub fn find_ref_alt_by_variantkey(&self, vk: u64) -> Option<(String, String)> {
        let (ref_allele, alt_allele) = self.entry(self.find(vk)?)?;
        Some((
            String::from_utf8_lossy(ref_allele).into_owned(),
            String::from_utf8_lossy(alt_allele).into_owned(),
        ))
    }

    /// Decodes a VariantKey, falling back to the table for hashed alleles
    ///
    /// The alleles are left empty when they are hashed and missing from the table.
    #[must_use]
    pub fn reverse_variantkey(&self, vk: u64) -> Variant {
        let parts = decode_variantkey(vk);
        let (ref_allele, alt_allele) = if is_reversible_refalt(parts.refalt) {
            decode_refalt(parts.refalt).unwrap_or_default()
        } else {
            tracing::trace!(vk, "looking up non-reversible variantkey");
            self.find_ref_alt_by_variantkey(vk).unwrap_or_default()
        };
        Variant {
            chrom: decode_chrom(parts.chrom),
            pos: parts.pos,
            ref_allele,
            alt_allele,
        }
    }

    /// Length of the REF allele of a VariantKey, 0 if unknown
    #[must_use]
    pub fn get_variantkey_ref_length(&self, vk: u64) -> u32 {
        let refalt = extract_variantkey_refalt(vk);
        if is_reversible_refalt(refalt) {
            return reversible_ref_length(refalt);
        }
        self.find(vk)
            .and_then(|item| self.entry(item))
            .map_or(0, |(ref_allele, _)| ref_allele.len() as u32)
    }

    /// End position (exclusive) of a variant: `pos + len(REF)`
    #[must_use]
    pub fn get_variantkey_endpos(&self, vk: u64) -> u32 {
        extract_variantkey_pos(vk) + self.get_variantkey_ref_length(vk)
    }

    /// Chromosome and end position packed like [`crate::variantkey::get_variantkey_chrom_startpos`]
    #[must_use]
    pub fn get_variantkey_chrom_endpos(&self, vk: u64) -> u64 {
        ((vk & VKMASK_CHROM) >> VKSHIFT_POS) | u64::from(self.get_variantkey_endpos(vk))
    }

    /// Checks whether a variant overlaps a region
    #[must_use]
    pub fn are_overlapping_variantkey_regionkey(&self, vk: u64, rk: u64) -> bool {
        regionkey::are_overlapping_variantkey_regionkey(vk, self.get_variantkey_endpos(vk), rk)
    }

    /// RegionKey spanning the REF allele of a variant
    #[must_use]
    pub fn variantkey_to_regionkey(&self, vk: u64) -> u64 {
        regionkey::variantkey_to_regionkey(vk, self.get_variantkey_endpos(vk))
    }

    /// Writes the table as tab-separated `vk`, `ref` and `alt` lines
    ///
    /// The VariantKey is written as 16 hexadecimal digits. Returns the number of
    /// bytes written.
    pub fn nrvk_bin_to_tsv<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = 0;
        for item in 0..self.num_records() {
            let Some((ref_allele, alt_allele)) = self.entry(item) else {
                tracing::warn!(item, "skipping record with an out-of-bounds allele entry");
                continue;
            };
            let vk = self.table.value(COL_VK, item);
            write!(writer, "{vk:016x}\t")?;
            writer.write_all(ref_allele)?;
            writer.write_all(b"\t")?;
            writer.write_all(alt_allele)?;
            writer.write_all(b"\n")?;
            written += 19 + ref_allele.len() + alt_allele.len();
        }
        Ok(written)
    }
}

/// Builder for NRVK table files
#[derive(Debug, Clone)]
pub struct NrvkWriter {
    inner: TableWriter,
}

impl Default for NrvkWriter {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}

impl NrvkWriter {
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            inner: TableWriter::new(TableKind::Nrvk, layout),
        }
    }

    /// Adds the alleles of a VariantKey
    ///
    /// # Errors
    ///
    /// Returns `WriteError::AlleleTooLong` if an allele is longer than 255 bytes.
    pub fn push(&mut self, vk: u64, ref_allele: &str, alt_allele: &str) -> Result<()> {
        let mut entry = Vec::with_capacity(2 + ref_allele.len() + alt_allele.len());
        for allele in [ref_allele, alt_allele] {
            let len =
                u8::try_from(allele.len()).map_err(|_| WriteError::AlleleTooLong(allele.len()))?;
            entry.push(len);
        }
        entry.extend_from_slice(ref_allele.as_bytes());
        entry.extend_from_slice(alt_allele.as_bytes());
        let offset = self.inner.push_blob(&entry);
        self.inner.push_row(vk, offset);
        Ok(())
    }

    /// Writes the table, sorted by VariantKey, and returns the number of bytes written
    pub fn write<W: Write>(self, inner: &mut W) -> Result<usize> {
        self.inner.write(inner)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.inner.into_bytes()
    }
}
