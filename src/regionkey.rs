//! RegionKey encoding
//!
//! A RegionKey packs a genomic interval into a sortable 64-bit integer:
//!
//! ```text
//!  63    59 58                31 30                 3 2      1 0
//! [ CHROM  |  STARTPOS (28 bit) |  ENDPOS (28 bit)   | STRAND | - ]
//! ```
//!
//! Intervals are half-open, `[startpos, endpos)`.

use crate::error::Result;
use crate::hex::{key_hex, parse_key_hex};
use crate::variantkey::{
    decode_chrom, encode_chrom, extract_variantkey_chrom, extract_variantkey_pos,
    extract_variantkey_refalt, is_reversible_refalt, reversible_ref_length, MAX_POS,
    VKMASK_CHROMPOS,
};

pub const RKMASK_CHROM: u64 = 0xF800_0000_0000_0000;
pub const RKMASK_STARTPOS: u64 = 0x07FF_FFFF_8000_0000;
pub const RKMASK_ENDPOS: u64 = 0x0000_0000_7FFF_FFF8;
pub const RKMASK_STRAND: u64 = 0x0000_0000_0000_0006;
pub const RKSHIFT_CHROM: u32 = 59;
pub const RKSHIFT_STARTPOS: u32 = 31;
pub const RKSHIFT_ENDPOS: u32 = 3;
pub const RKSHIFT_STRAND: u32 = 1;

/// Decoded fields of a RegionKey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionKeyParts {
    pub chrom: u8,
    pub startpos: u32,
    pub endpos: u32,
    /// Encoded strand: 0 unknown, 1 forward, 2 reverse
    pub strand: u8,
}

/// A region in human readable form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub chrom: &'static str,
    pub startpos: u32,
    pub endpos: u32,
    /// Strand direction: -1 reverse, 0 unknown, +1 forward
    pub strand: i8,
}

/// Encodes a strand direction (-1, 0, +1) into its 2-bit code (2, 0, 1)
#[must_use]
pub const fn encode_region_strand(strand: i8) -> u8 {
    [2, 0, 1, 0][((strand as i16 + 1) & 3) as usize]
}

/// Decodes a 2-bit strand code into a strand direction
#[must_use]
pub const fn decode_region_strand(strand: u8) -> i8 {
    [0, 1, -1, 0][(strand & 3) as usize]
}

/// Assembles a RegionKey from its encoded fields
///
/// Each field is truncated to its bit width.
#[must_use]
pub const fn encode_regionkey(chrom: u8, startpos: u32, endpos: u32, strand: u8) -> u64 {
    (((chrom as u64) << RKSHIFT_CHROM) & RKMASK_CHROM)
        | (((startpos as u64) << RKSHIFT_STARTPOS) & RKMASK_STARTPOS)
        | (((endpos as u64) << RKSHIFT_ENDPOS) & RKMASK_ENDPOS)
        | (((strand as u64) << RKSHIFT_STRAND) & RKMASK_STRAND)
}

#[must_use]
pub const fn extract_regionkey_chrom(rk: u64) -> u8 {
    ((rk & RKMASK_CHROM) >> RKSHIFT_CHROM) as u8
}

#[must_use]
pub const fn extract_regionkey_startpos(rk: u64) -> u32 {
    ((rk & RKMASK_STARTPOS) >> RKSHIFT_STARTPOS) as u32
}

#[must_use]
pub const fn extract_regionkey_endpos(rk: u64) -> u32 {
    ((rk & RKMASK_ENDPOS) >> RKSHIFT_ENDPOS) as u32
}

#[must_use]
pub const fn extract_regionkey_strand(rk: u64) -> u8 {
    ((rk & RKMASK_STRAND) >> RKSHIFT_STRAND) as u8
}

#[must_use]
pub const fn decode_regionkey(rk: u64) -> RegionKeyParts {
    RegionKeyParts {
        chrom: extract_regionkey_chrom(rk),
        startpos: extract_regionkey_startpos(rk),
        endpos: extract_regionkey_endpos(rk),
        strand: extract_regionkey_strand(rk),
    }
}

/// Decodes a RegionKey into human readable form
#[must_use]
pub fn reverse_regionkey(rk: u64) -> Region {
    let parts = decode_regionkey(rk);
    Region {
        chrom: decode_chrom(parts.chrom),
        startpos: parts.startpos,
        endpos: parts.endpos,
        strand: decode_region_strand(parts.strand),
    }
}

/// Encodes a region given in human readable form
#[must_use]
pub fn regionkey(chrom: &str, startpos: u32, endpos: u32, strand: i8) -> u64 {
    encode_regionkey(
        encode_chrom(chrom),
        startpos,
        endpos,
        encode_region_strand(strand),
    )
}

/// Widens a region by `size` on both sides
///
/// The start is clamped at 0 and the end at the largest encodable position.
#[must_use]
pub const fn extend_regionkey(rk: u64, size: u32) -> u64 {
    let startpos = extract_regionkey_startpos(rk).saturating_sub(size);
    let endpos = extract_regionkey_endpos(rk);
    let endpos = if MAX_POS - endpos <= size {
        MAX_POS
    } else {
        endpos + size
    };
    (rk & !(RKMASK_STARTPOS | RKMASK_ENDPOS))
        | ((startpos as u64) << RKSHIFT_STARTPOS)
        | ((endpos as u64) << RKSHIFT_ENDPOS)
}

/// Formats a RegionKey as a 16-character hexadecimal string
#[must_use]
pub fn regionkey_hex(rk: u64) -> String {
    key_hex(rk)
}

/// Parses a RegionKey from its 16-character hexadecimal form
pub fn parse_regionkey_hex(hex: &str) -> Result<u64> {
    parse_key_hex(hex)
}

/// Chromosome and start position as a single sortable number
#[must_use]
pub const fn get_regionkey_chrom_startpos(rk: u64) -> u64 {
    rk >> RKSHIFT_STARTPOS
}

/// Chromosome and end position as a single sortable number
#[must_use]
pub const fn get_regionkey_chrom_endpos(rk: u64) -> u64 {
    ((rk & RKMASK_CHROM) >> RKSHIFT_STARTPOS) | extract_regionkey_endpos(rk) as u64
}

/// Checks whether two regions overlap
#[must_use]
pub const fn are_overlapping_regions(
    a_chrom: u8,
    a_startpos: u32,
    a_endpos: u32,
    b_chrom: u8,
    b_startpos: u32,
    b_endpos: u32,
) -> bool {
    a_chrom == b_chrom && a_startpos < b_endpos && a_endpos > b_startpos
}

/// Checks whether a region overlaps the region encoded in a RegionKey
#[must_use]
pub const fn are_overlapping_region_regionkey(
    chrom: u8,
    startpos: u32,
    endpos: u32,
    rk: u64,
) -> bool {
    are_overlapping_regions(
        chrom,
        startpos,
        endpos,
        extract_regionkey_chrom(rk),
        extract_regionkey_startpos(rk),
        extract_regionkey_endpos(rk),
    )
}

/// Checks whether two RegionKeys overlap
#[must_use]
pub const fn are_overlapping_regionkeys(rka: u64, rkb: u64) -> bool {
    are_overlapping_region_regionkey(
        extract_regionkey_chrom(rka),
        extract_regionkey_startpos(rka),
        extract_regionkey_endpos(rka),
        rkb,
    )
}

/// End position of a variant with a reversible allele code (`pos + len(REF)`)
///
/// Returns `None` for hashed allele codes, whose REF length has to be looked up
/// in a [`crate::Nrvk`] table.
#[must_use]
pub const fn reversible_variantkey_endpos(vk: u64) -> Option<u32> {
    let refalt = extract_variantkey_refalt(vk);
    if is_reversible_refalt(refalt) {
        Some(extract_variantkey_pos(vk) + reversible_ref_length(refalt))
    } else {
        None
    }
}

/// Checks whether the variant `vk` spanning `[pos, endpos)` overlaps a RegionKey
///
/// `endpos` is normally `pos + len(REF)`, see [`crate::Nrvk::get_variantkey_endpos`].
#[must_use]
pub const fn are_overlapping_variantkey_regionkey(vk: u64, endpos: u32, rk: u64) -> bool {
    are_overlapping_region_regionkey(
        extract_variantkey_chrom(vk),
        extract_variantkey_pos(vk),
        endpos,
        rk,
    )
}

/// Converts a variant spanning `[pos, endpos)` into a RegionKey with unknown strand
#[must_use]
pub const fn variantkey_to_regionkey(vk: u64, endpos: u32) -> u64 {
    (vk & VKMASK_CHROMPOS) | (((endpos as u64) << RKSHIFT_ENDPOS) & RKMASK_ENDPOS)
}
