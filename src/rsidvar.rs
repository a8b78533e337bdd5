//! Lookup tables between rsIDs and VariantKeys
//!
//! Two tables link reference SNP identifiers to variants:
//!
//! * [`RvTable`], sorted by rsID, maps an rsID to its VariantKeys;
//! * [`VrTable`], sorted by VariantKey, maps a VariantKey to its rsIDs.
//!
//! An rsID can map to several variants (and the reverse), so lookups return the
//! first matching record together with its position, from which the rest of
//! the run can be walked with the `get_next_*` and `get_prev_*` functions.

use std::io::Write;
use std::path::Path;

use crate::binsearch::{KeyField, SearchRange};
use crate::error::Result;
use crate::mmap::MappedFile;
use crate::table::{Layout, Table, TableKind, TableWriter};
use crate::variantkey::{variantkey_range, VKSHIFT_POS};

const COL_KEY: usize = 0;
const COL_VALUE: usize = 1;

/// Bits of a VariantKey holding the chromosome and position
const CHROMPOS_BITS: (u8, u8) = (0, 32);

/// Records of a [`VrTable`] whose chromosome and position fall in an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromPosRange {
    /// rsID of the first record in the interval
    pub rsid: u32,
    /// Position of the first record in the interval
    pub first: u64,
    /// Position of the last record in the interval
    pub last: u64,
}

/// Position of the first record in `range` whose key is `search`
fn find_item(table: &Table, first: u64, last: u64, search: u64) -> Option<u64> {
    let mut range = table.clamp(first, last)?;
    let last = range.last;
    let item = table.search(COL_KEY).find_first(&mut range, search);
    (item <= last).then_some(item)
}

/// A memory-mapped rsID to VariantKey table
#[derive(Clone, Debug)]
pub struct RvTable {
    table: Table,
}

impl RvTable {
    /// Memory-maps and validates an RV table file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            table: Table::open(path, TableKind::Rv)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_file(MappedFile::from_bytes(bytes)?)
    }

    pub fn from_file(file: MappedFile) -> Result<Self> {
        Ok(Self {
            table: Table::from_file(file, TableKind::Rv)?,
        })
    }

    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.table.num_records()
    }

    /// VariantKey stored at a position, `None` past the end of the table
    #[must_use]
    pub fn get_rv_variantkey(&self, item: u64) -> Option<u64> {
        (item < self.num_records()).then(|| self.table.value(COL_VALUE, item))
    }

    /// Searches the records `first..=last` for an rsID
    ///
    /// # Returns
    ///
    /// The VariantKey of the first matching record and its position, or `None`
    /// if the rsID is absent. `last` is clamped to the end of the table.
    #[must_use]
    pub fn find_rv_variantkey_by_rsid(
        &self,
        first: u64,
        last: u64,
        rsid: u32,
    ) -> Option<(u64, u64)> {
        let item = find_item(&self.table, first, last, u64::from(rsid))?;
        Some((self.table.value(COL_VALUE, item), item))
    }

    /// Moves `pos` to the next record and returns its VariantKey if it still
    /// has the given rsID
    ///
    /// `pos` is not moved past `last`.
    pub fn get_next_rv_variantkey_by_rsid(
        &self,
        pos: &mut u64,
        last: u64,
        rsid: u32,
    ) -> Option<u64> {
        let last = last.min(self.num_records().checked_sub(1)?);
        self.table
            .search(COL_KEY)
            .has_next(pos, last, u64::from(rsid))
            .then(|| self.table.value(COL_VALUE, *pos))
    }

    /// Moves `pos` to the previous record and returns its VariantKey if it
    /// still has the given rsID
    ///
    /// `pos` is not moved before `first`.
    pub fn get_prev_rv_variantkey_by_rsid(
        &self,
        first: u64,
        pos: &mut u64,
        rsid: u32,
    ) -> Option<u64> {
        if *pos >= self.num_records() {
            return None;
        }
        self.table
            .search(COL_KEY)
            .has_prev(first, pos, u64::from(rsid))
            .then(|| self.table.value(COL_VALUE, *pos))
    }

    /// All VariantKeys of an rsID, in table order
    #[must_use]
    pub fn find_all_rv_variantkey_by_rsid(&self, rsid: u32) -> Vec<u64> {
        let Some((vk, mut pos)) = self.find_rv_variantkey_by_rsid(0, u64::MAX, rsid) else {
            return Vec::new();
        };
        let mut variantkeys = vec![vk];
        while let Some(vk) = self.get_next_rv_variantkey_by_rsid(&mut pos, u64::MAX, rsid) {
            variantkeys.push(vk);
        }
        variantkeys
    }
}

/// A memory-mapped VariantKey to rsID table
#[derive(Clone, Debug)]
pub struct VrTable {
    table: Table,
    chrompos: KeyField,
}

impl VrTable {
    /// Memory-maps and validates a VR table file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Table::open(path, TableKind::Vr)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_file(MappedFile::from_bytes(bytes)?)
    }

    pub fn from_file(file: MappedFile) -> Result<Self> {
        Self::new(Table::from_file(file, TableKind::Vr)?)
    }

    fn new(table: Table) -> Result<Self> {
        let (start, end) = CHROMPOS_BITS;
        let chrompos = table.field(COL_KEY).with_bits(start, end)?;
        Ok(Self { table, chrompos })
    }

    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.table.num_records()
    }

    /// rsID stored at a position, `None` past the end of the table
    #[must_use]
    pub fn get_vr_rsid(&self, item: u64) -> Option<u32> {
        (item < self.num_records()).then(|| self.table.value(COL_VALUE, item) as u32)
    }

    /// Searches the records `first..=last` for a VariantKey
    ///
    /// # Returns
    ///
    /// The rsID of the first matching record and its position, or `None` if
    /// the VariantKey is absent.
    #[must_use]
    pub fn find_vr_rsid_by_variantkey(
        &self,
        first: u64,
        last: u64,
        vk: u64,
    ) -> Option<(u32, u64)> {
        let item = find_item(&self.table, first, last, vk)?;
        Some((self.table.value(COL_VALUE, item) as u32, item))
    }

    /// Finds the records `first..=last` of variants located on `chrom` between
    /// `pos_min` and `pos_max` (inclusive)
    ///
    /// # Example
    ///
    /// ```
    /// # fn main() -> ::variantkey::Result<()> {
    /// # use ::variantkey::{variantkey, Layout, VrTable, VrWriter};
    /// let mut writer = VrWriter::new(Layout::Row);
    /// writer.push(variantkey("1", 100, "A", "C"), 11);
    /// writer.push(variantkey("1", 200, "A", "C"), 12);
    /// writer.push(variantkey("1", 300, "A", "C"), 13);
    /// let vr = VrTable::from_bytes(&writer.into_bytes()?)?;
    ///
    /// let range = vr.find_vr_chrompos_range(0, u64::MAX, 1, 150, 300).unwrap();
    /// assert_eq!((range.rsid, range.first, range.last), (12, 1, 2));
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn find_vr_chrompos_range(
        &self,
        first: u64,
        last: u64,
        chrom: u8,
        pos_min: u32,
        pos_max: u32,
    ) -> Option<ChromPosRange> {
        let keys = variantkey_range(chrom, pos_min, pos_max);
        let (kmin, kmax) = (keys.min >> VKSHIFT_POS, keys.max >> VKSHIFT_POS);
        let search = self.table.search_field(self.chrompos);

        let mut range = self.table.clamp(first, last)?;
        let last = range.last;
        let found = search.find_first(&mut range, kmin);
        let start = if found <= last { found } else { range.first };
        if start > last {
            return None;
        }

        let mut range = SearchRange::new(start, last);
        let found = search.find_last(&mut range, kmax);
        let end = if found <= last { found } else { range.last };
        if end < start || search.get(end) > kmax {
            return None;
        }

        Some(ChromPosRange {
            rsid: self.table.value(COL_VALUE, start) as u32,
            first: start,
            last: end,
        })
    }
}

/// Builder for RV table files
#[derive(Debug, Clone)]
pub struct RvWriter {
    inner: TableWriter,
}

impl RvWriter {
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            inner: TableWriter::new(TableKind::Rv, layout),
        }
    }

    pub fn push(&mut self, rsid: u32, vk: u64) {
        self.inner.push_row(u64::from(rsid), vk);
    }

    /// Writes the table, sorted by rsID, and returns the number of bytes written
    pub fn write<W: Write>(self, inner: &mut W) -> Result<usize> {
        self.inner.write(inner)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.inner.into_bytes()
    }
}

/// Builder for VR table files
#[derive(Debug, Clone)]
pub struct VrWriter {
    inner: TableWriter,
}

impl VrWriter {
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            inner: TableWriter::new(TableKind::Vr, layout),
        }
    }

    pub fn push(&mut self, vk: u64, rsid: u32) {
        self.inner.push_row(vk, u64::from(rsid));
    }

    /// Writes the table, sorted by VariantKey, and returns the number of bytes written
    pub fn write<W: Write>(self, inner: &mut W) -> Result<usize> {
        self.inner.write(inner)
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.inner.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variantkey::{variantkey, MAX_POS};

    const LAYOUTS: [Layout; 2] = [Layout::Row, Layout::Column];

    /// (chrom, pos, ref, alt, rsid), in VariantKey order
    const VARIANTS: &[(&str, u32, &str, &str, u32)] = &[
        ("1", 100, "A", "C", 10),
        ("1", 200, "A", "C", 11),
        ("1", 300, "A", "C", 12),
        ("2", 1000, "A", "C", 30),
        ("2", 1000, "A", "G", 31),
        ("2", 1500, "A", "C", 32),
        ("2", 2000, "A", "C", 33),
        ("2", 2000, "A", "T", 34),
        ("2", 2500, "A", "C", 35),
        ("3", 1000, "A", "C", 36),
    ];

    /// (rsid, vk), with a run of three records for rsID 3
    const RV_ROWS: &[(u32, u64)] = &[
        (9, 0x0900),
        (3, 0x0300),
        (7, 0x0700),
        (3, 0x0301),
        (1, 0x0100),
        (3, 0x0302),
    ];

    fn test_rv(layout: Layout) -> RvTable {
        let mut writer = RvWriter::new(layout);
        for &(rsid, vk) in RV_ROWS {
            writer.push(rsid, vk);
        }
        RvTable::from_bytes(&writer.into_bytes().unwrap()).unwrap()
    }

    fn test_vr(layout: Layout) -> VrTable {
        let mut writer = VrWriter::new(layout);
        for &(chrom, pos, r, a, rsid) in VARIANTS.iter().rev() {
            writer.push(variantkey(chrom, pos, r, a), rsid);
        }
        VrTable::from_bytes(&writer.into_bytes().unwrap()).unwrap()
    }

    // ==================== RV Tests ====================

    #[test]
    fn test_get_rv_variantkey() {
        for layout in LAYOUTS {
            let rv = test_rv(layout);
            assert_eq!(rv.num_records(), 6);
            assert_eq!(rv.get_rv_variantkey(0), Some(0x0100));
            assert_eq!(rv.get_rv_variantkey(1), Some(0x0300));
            assert_eq!(rv.get_rv_variantkey(5), Some(0x0900));
            assert_eq!(rv.get_rv_variantkey(6), None);
        }
    }

    #[test]
    fn test_find_rv_variantkey_by_rsid() {
        for layout in LAYOUTS {
            let rv = test_rv(layout);
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 5, 1), Some((0x0100, 0)));
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 5, 3), Some((0x0300, 1)));
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 5, 9), Some((0x0900, 5)));
            assert_eq!(rv.find_rv_variantkey_by_rsid(2, 5, 3), Some((0x0301, 2)));
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 5, 4), None);
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 5, 10), None);
            assert_eq!(rv.find_rv_variantkey_by_rsid(0, 0, 3), None);
            assert_eq!(rv.find_rv_variantkey_by_rsid(6, 9, 9), None);
        }
    }

    #[test]
    fn test_get_next_rv_variantkey_by_rsid() {
        let rv = test_rv(Layout::Row);
        let (_, mut pos) = rv.find_rv_variantkey_by_rsid(0, 5, 3).unwrap();
        assert_eq!(rv.get_next_rv_variantkey_by_rsid(&mut pos, 5, 3), Some(0x0301));
        assert_eq!(pos, 2);
        assert_eq!(rv.get_next_rv_variantkey_by_rsid(&mut pos, 5, 3), Some(0x0302));
        assert_eq!(pos, 3);
        assert_eq!(rv.get_next_rv_variantkey_by_rsid(&mut pos, 5, 3), None);
        assert_eq!(pos, 4);

        let mut pos = 5;
        assert_eq!(rv.get_next_rv_variantkey_by_rsid(&mut pos, 5, 9), None);
        assert_eq!(pos, 5);
    }

    #[test]
    fn test_get_prev_rv_variantkey_by_rsid() {
        let rv = test_rv(Layout::Column);
        let mut pos = 3;
        assert_eq!(rv.get_prev_rv_variantkey_by_rsid(0, &mut pos, 3), Some(0x0301));
        assert_eq!(rv.get_prev_rv_variantkey_by_rsid(0, &mut pos, 3), Some(0x0300));
        assert_eq!(pos, 1);
        assert_eq!(rv.get_prev_rv_variantkey_by_rsid(0, &mut pos, 3), None);
        assert_eq!(pos, 0);
        assert_eq!(rv.get_prev_rv_variantkey_by_rsid(0, &mut pos, 1), None);
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_find_all_rv_variantkey_by_rsid() {
        for layout in LAYOUTS {
            let rv = test_rv(layout);
            assert_eq!(
                rv.find_all_rv_variantkey_by_rsid(3),
                vec![0x0300, 0x0301, 0x0302]
            );
            assert_eq!(rv.find_all_rv_variantkey_by_rsid(9), vec![0x0900]);
            assert!(rv.find_all_rv_variantkey_by_rsid(2).is_empty());
        }
    }

    // ==================== VR Tests ====================

    #[test]
    fn test_get_vr_rsid() {
        for layout in LAYOUTS {
            let vr = test_vr(layout);
            assert_eq!(vr.num_records(), 10);
            for (item, &(.., rsid)) in VARIANTS.iter().enumerate() {
                assert_eq!(vr.get_vr_rsid(item as u64), Some(rsid));
            }
            assert_eq!(vr.get_vr_rsid(10), None);
        }
    }

    #[test]
    fn test_find_vr_rsid_by_variantkey() {
        for layout in LAYOUTS {
            let vr = test_vr(layout);
            for (item, &(chrom, pos, r, a, rsid)) in VARIANTS.iter().enumerate() {
                let vk = variantkey(chrom, pos, r, a);
                assert_eq!(
                    vr.find_vr_rsid_by_variantkey(0, 9, vk),
                    Some((rsid, item as u64))
                );
            }
            let missing = variantkey("2", 1000, "A", "A");
            assert_eq!(vr.find_vr_rsid_by_variantkey(0, 9, missing), None);
        }
    }

    #[test]
    fn test_find_vr_chrompos_range() {
        for layout in LAYOUTS {
            let vr = test_vr(layout);
            assert_eq!(
                vr.find_vr_chrompos_range(0, 9, 2, 1000, 2000),
                Some(ChromPosRange {
                    rsid: 30,
                    first: 3,
                    last: 7
                })
            );
            assert_eq!(
                vr.find_vr_chrompos_range(4, 9, 2, 1000, 2000),
                Some(ChromPosRange {
                    rsid: 31,
                    first: 4,
                    last: 7
                })
            );
            assert_eq!(
                vr.find_vr_chrompos_range(0, 9, 2, 0, MAX_POS),
                Some(ChromPosRange {
                    rsid: 30,
                    first: 3,
                    last: 8
                })
            );
            assert_eq!(
                vr.find_vr_chrompos_range(0, 9, 1, 0, 100),
                Some(ChromPosRange {
                    rsid: 10,
                    first: 0,
                    last: 0
                })
            );
            assert_eq!(
                vr.find_vr_chrompos_range(0, u64::MAX, 3, 1000, 1000),
                Some(ChromPosRange {
                    rsid: 36,
                    first: 9,
                    last: 9
                })
            );
        }
    }

    #[test]
    fn test_find_vr_chrompos_range_empty() {
        let vr = test_vr(Layout::Row);
        // gap between records
        assert_eq!(vr.find_vr_chrompos_range(0, 9, 2, 1100, 1400), None);
        // before every record
        assert_eq!(vr.find_vr_chrompos_range(0, 9, 1, 0, 50), None);
        // after every record
        assert_eq!(vr.find_vr_chrompos_range(0, 9, 3, 1001, MAX_POS), None);
        // chromosome without records
        assert_eq!(vr.find_vr_chrompos_range(0, 9, 22, 0, MAX_POS), None);
        // interval outside the searched rows
        assert_eq!(vr.find_vr_chrompos_range(0, 2, 2, 1000, 2000), None);
        assert_eq!(vr.find_vr_chrompos_range(10, 20, 2, 1000, 2000), None);
    }

    #[test]
    fn test_empty_tables() {
        let rv = RvTable::from_bytes(&RvWriter::new(Layout::Row).into_bytes().unwrap()).unwrap();
        assert_eq!(rv.find_rv_variantkey_by_rsid(0, 10, 1), None);
        assert!(rv.find_all_rv_variantkey_by_rsid(1).is_empty());
        let mut pos = 0;
        assert_eq!(rv.get_next_rv_variantkey_by_rsid(&mut pos, 10, 1), None);
        assert_eq!(rv.get_prev_rv_variantkey_by_rsid(0, &mut pos, 1), None);

        let bytes = VrWriter::new(Layout::Column).into_bytes().unwrap();
        let vr = VrTable::from_bytes(&bytes).unwrap();
        assert_eq!(vr.find_vr_chrompos_range(0, 10, 1, 0, MAX_POS), None);
    }

    #[test]
    fn test_open_rv_file() {
        let path = std::env::temp_dir().join(format!("rsidvar-{}.bin", std::process::id()));
        let mut writer = RvWriter::new(Layout::Row);
        writer.push(5, 0x0500);
        let mut file = std::fs::File::create(&path).unwrap();
        writer.write(&mut file).unwrap();
        drop(file);

        let rv = RvTable::open(&path).unwrap();
        assert_eq!(rv.find_rv_variantkey_by_rsid(0, 0, 5), Some((0x0500, 0)));
        assert!(VrTable::open(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
