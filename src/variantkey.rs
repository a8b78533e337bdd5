//! VariantKey encoding
//!
//! A VariantKey packs a genetic variant into a single sortable 64-bit integer:
//!
//! ```text
//!  63    59 58                        31 30                             0
//! [ CHROM  |          POS (28 bit)     |         REF+ALT (31 bit)       ]
//! ```
//!
//! Sorting the integers sorts variants by chromosome, then position, then allele
//! code. The REF+ALT field holds either a reversible 2-bit packing of the alleles
//! (least significant bit `0`) or a 31-bit hash of them (least significant bit
//! `1`). Variants with a hashed allele code can only be reversed with the help of
//! a [`crate::Nrvk`] table.

use std::cmp::Ordering;

use crate::error::{CodecError, Result};
use crate::hex::{key_hex, parse_key_hex};

/// Chromosome code used for unknown or invalid chromosome names
pub const CHROM_NA: u8 = 0;

/// Largest valid chromosome code (MT)
pub const CHROM_MAX: u8 = 25;

pub const VKMASK_CHROM: u64 = 0xF800_0000_0000_0000;
pub const VKMASK_POS: u64 = 0x07FF_FFFF_8000_0000;
pub const VKMASK_CHROMPOS: u64 = 0xFFFF_FFFF_8000_0000;
pub const VKMASK_REFALT: u64 = 0x0000_0000_7FFF_FFFF;
pub const VKSHIFT_CHROM: u32 = 59;
pub const VKSHIFT_POS: u32 = 31;

/// Largest position that fits in a key
pub const MAX_POS: u32 = 0x0FFF_FFFF;

/// Maximum number of REF plus ALT bases that can be reversibly encoded
pub const MAX_REVERSIBLE_BASES: usize = 11;

const CHROM_NAMES: [&str; 26] = [
    "NA", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
    "17", "18", "19", "20", "21", "22", "X", "Y", "MT",
];

/// Decoded fields of a VariantKey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKeyParts {
    pub chrom: u8,
    pub pos: u32,
    pub refalt: u32,
}

/// A variant in human readable form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    pub chrom: &'static str,
    pub pos: u32,
    pub ref_allele: String,
    pub alt_allele: String,
}

/// Inclusive key bounds covering every variant of a chromosome interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantKeyRange {
    pub min: u64,
    pub max: u64,
}
impl VariantKeyRange {
    /// Checks whether a key falls inside the bounds
    #[must_use]
    pub fn contains(&self, vk: u64) -> bool {
        (self.min..=self.max).contains(&vk)
    }
}

// ==================== Chromosome ====================

/// Encodes a chromosome name into its numerical code
///
/// Names are case-insensitive and may carry a `chr` prefix. Autosomes map to
/// `1..=22`, `X` to 23, `Y` to 24 and `M`/`MT` to 25.
///
/// # Returns
///
/// The chromosome code, or [`CHROM_NA`] if the name is not recognised (this
/// includes names containing whitespace).
#[must_use]
pub fn encode_chrom(chrom: &str) -> u8 {
    let mut name = chrom.as_bytes();
    if name.len() > 3 && name[..3].eq_ignore_ascii_case(b"chr") {
        name = &name[3..];
    }
    match name {
        [first, ..] if first.is_ascii_digit() => {
            let mut code: u32 = 0;
            for &b in name {
                if !b.is_ascii_digit() {
                    return CHROM_NA;
                }
                code = code * 10 + u32::from(b - b'0');
                if code > u32::from(CHROM_MAX) {
                    return CHROM_NA;
                }
            }
            code as u8
        }
        [b'X' | b'x'] => 23,
        [b'Y' | b'y'] => 24,
        [b'M' | b'm'] | [b'M' | b'm', b'T' | b't'] => 25,
        _ => CHROM_NA,
    }
}

/// Decodes a chromosome code into its canonical name
///
/// Unknown codes decode to `"NA"`.
#[must_use]
pub fn decode_chrom(code: u8) -> &'static str {
    CHROM_NAMES.get(usize::from(code)).copied().unwrap_or("NA")
}

/// Encodes a chromosome name, failing on names that do not map to a chromosome
///
/// # Errors
///
/// Returns `CodecError::InvalidChromosome` if [`encode_chrom`] yields [`CHROM_NA`].
pub fn parse_chrom(chrom: &str) -> Result<u8> {
    match encode_chrom(chrom) {
        CHROM_NA => Err(CodecError::InvalidChromosome(chrom.to_string()).into()),
        code => Ok(code),
    }
}

// ==================== REF+ALT ====================

#[inline]
fn encode_base(base: u8) -> Option<u32> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
fn decode_base(code: u32, bitpos: u32) -> char {
    ['A', 'C', 'G', 'T'][((code >> bitpos) & 0x3) as usize]
}

/// Packs short ACGT alleles: 4-bit REF length, 4-bit ALT length, then 2 bits per base
fn encode_refalt_rev(ref_allele: &[u8], alt_allele: &[u8]) -> Option<u32> {
    // the all-zero code is reserved
    if ref_allele.is_empty() && alt_allele.is_empty() {
        return None;
    }
    let mut code = ((ref_allele.len() as u32) << 27) | ((alt_allele.len() as u32) << 23);
    let mut bitpos = 23;
    for &base in ref_allele.iter().chain(alt_allele) {
        bitpos -= 2;
        code |= encode_base(base)? << bitpos;
    }
    Some(code)
}

/// Mixes two 32 bit hash numbers (MurmurHash3 block mix)
#[inline]
fn muxhash(k: u32, h: u32) -> u32 {
    let k = k.wrapping_mul(0xcc9e_2d51).rotate_left(15).wrapping_mul(0x1b87_3593);
    (h ^ k)
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe654_6b64)
}

#[inline]
fn pack_char(c: u8) -> u32 {
    if c < b'A' {
        27
    } else if c >= b'a' {
        u32::from(c - 96)
    } else {
        u32::from(c - 64)
    }
}

/// Packs up to 6 characters, 5 bits each, first character in the top bits
fn pack_chars(chunk: &[u8]) -> u32 {
    chunk
        .iter()
        .enumerate()
        .fold(0, |h, (i, &c)| h ^ (pack_char(c) << (26 - 5 * i)))
}

fn hash32(allele: &[u8]) -> u32 {
    allele
        .chunks(6)
        .fold(0, |h, chunk| muxhash(pack_chars(chunk), h))
}

fn encode_refalt_hash(ref_allele: &[u8], alt_allele: &[u8]) -> u32 {
    // 0x3 separates REF from ALT
    let mut h = muxhash(hash32(alt_allele), muxhash(0x3, hash32(ref_allele)));
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    (h >> 1) | 0x1
}

/// Encodes the REF and ALT alleles into the 31-bit REF+ALT code
///
/// Alleles with at most 11 bases in total, made of `A`, `C`, `G` and `T` only
/// (either case), are packed reversibly. Anything else is hashed and the least
/// significant bit of the code is set.
#[must_use]
pub fn encode_refalt(ref_allele: &str, alt_allele: &str) -> u32 {
    let (r, a) = (ref_allele.as_bytes(), alt_allele.as_bytes());
    if r.len() + a.len() <= MAX_REVERSIBLE_BASES {
        if let Some(code) = encode_refalt_rev(r, a) {
            return code;
        }
    }
    encode_refalt_hash(r, a)
}

/// Checks whether a REF+ALT code can be decoded without a lookup table
#[must_use]
pub const fn is_reversible_refalt(code: u32) -> bool {
    code & 0x1 == 0
}

/// Decodes a reversible REF+ALT code into `(ref, alt)`
///
/// Returns `None` for hashed codes and for codes whose allele lengths do not
/// fit in the reversible encoding.
#[must_use]
pub fn decode_refalt(code: u32) -> Option<(String, String)> {
    if !is_reversible_refalt(code) {
        return None;
    }
    let sizeref = (code & 0x7800_0000) >> 27;
    let sizealt = (code & 0x0780_0000) >> 23;
    if (sizeref + sizealt) as usize > MAX_REVERSIBLE_BASES {
        return None;
    }
    let mut bitpos = 23;
    let mut next = || {
        bitpos -= 2;
        decode_base(code, bitpos)
    };
    let ref_allele: String = (0..sizeref).map(|_| next()).collect();
    let alt_allele: String = (0..sizealt).map(|_| next()).collect();
    Some((ref_allele, alt_allele))
}

/// Length of the REF allele stored in a reversible REF+ALT code
#[must_use]
pub const fn reversible_ref_length(code: u32) -> u32 {
    (code & 0x7800_0000) >> 27
}

// ==================== VariantKey ====================

/// Assembles a VariantKey from its encoded fields
///
/// Each field is truncated to its bit width.
#[must_use]
pub const fn encode_variantkey(chrom: u8, pos: u32, refalt: u32) -> u64 {
    (((chrom as u64) << VKSHIFT_CHROM) & VKMASK_CHROM)
        | (((pos as u64) << VKSHIFT_POS) & VKMASK_POS)
        | ((refalt as u64) & VKMASK_REFALT)
}

#[must_use]
pub const fn extract_variantkey_chrom(vk: u64) -> u8 {
    ((vk & VKMASK_CHROM) >> VKSHIFT_CHROM) as u8
}

#[must_use]
pub const fn extract_variantkey_pos(vk: u64) -> u32 {
    ((vk & VKMASK_POS) >> VKSHIFT_POS) as u32
}

#[must_use]
pub const fn extract_variantkey_refalt(vk: u64) -> u32 {
    (vk & VKMASK_REFALT) as u32
}

#[must_use]
pub const fn decode_variantkey(vk: u64) -> VariantKeyParts {
    VariantKeyParts {
        chrom: extract_variantkey_chrom(vk),
        pos: extract_variantkey_pos(vk),
        refalt: extract_variantkey_refalt(vk),
    }
}

/// Encodes a variant given in human readable form
///
/// # Arguments
///
/// * `chrom` - Chromosome name (e.g. `"chr1"`, `"X"`, `"MT"`)
/// * `pos` - 0-based position
/// * `ref_allele` - Reference allele
/// * `alt_allele` - Alternate allele
#[must_use]
pub fn variantkey(chrom: &str, pos: u32, ref_allele: &str, alt_allele: &str) -> u64 {
    encode_variantkey(
        encode_chrom(chrom),
        pos,
        encode_refalt(ref_allele, alt_allele),
    )
}

/// Decodes a VariantKey whose allele code is reversible
///
/// For hashed allele codes the alleles are left empty; use
/// [`crate::Nrvk::reverse_variantkey`] to recover them.
#[must_use]
pub fn reverse_variantkey(vk: u64) -> Variant {
    let parts = decode_variantkey(vk);
    let (ref_allele, alt_allele) = decode_refalt(parts.refalt).unwrap_or_default();
    Variant {
        chrom: decode_chrom(parts.chrom),
        pos: parts.pos,
        ref_allele,
        alt_allele,
    }
}

/// Key bounds of all the variants of a chromosome within `[pos_min, pos_max]`
#[must_use]
pub const fn variantkey_range(chrom: u8, pos_min: u32, pos_max: u32) -> VariantKeyRange {
    let chrom = ((chrom as u64) << VKSHIFT_CHROM) & VKMASK_CHROM;
    VariantKeyRange {
        min: chrom | (((pos_min as u64) << VKSHIFT_POS) & VKMASK_POS),
        max: chrom | (((pos_max as u64) << VKSHIFT_POS) & VKMASK_POS) | VKMASK_REFALT,
    }
}

/// Compares the chromosome of two keys
#[must_use]
pub fn compare_variantkey_chrom(vka: u64, vkb: u64) -> Ordering {
    (vka >> VKSHIFT_CHROM).cmp(&(vkb >> VKSHIFT_CHROM))
}

/// Compares the chromosome and position of two keys
#[must_use]
pub fn compare_variantkey_chrom_pos(vka: u64, vkb: u64) -> Ordering {
    (vka >> VKSHIFT_POS).cmp(&(vkb >> VKSHIFT_POS))
}

/// Chromosome and start position as a single sortable number
#[must_use]
pub const fn get_variantkey_chrom_startpos(vk: u64) -> u64 {
    vk >> VKSHIFT_POS
}

/// Formats a VariantKey as a 16-character hexadecimal string
#[must_use]
pub fn variantkey_hex(vk: u64) -> String {
    key_hex(vk)
}

/// Parses a VariantKey from its 16-character hexadecimal form
pub fn parse_variantkey_hex(hex: &str) -> Result<u64> {
    parse_key_hex(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (chrom, pos, ref, alt, key) taken from the NRVK reference records
    const HASHED: [(&str, u32, &str, &str, u64); 10] = [
        ("1", 100_001, "N", "A", 0x0800_c350_93ac_e339),
        ("2", 100_002, "AAGAAAGAAAG", "A", 0x1000_c351_7f91_cdb1),
        ("3", 100_003, "A", "AAGAAAGAAAG", 0x1800_c351_f61f_65d3),
        ("4", 100_004, "ACGTACGT", "ACGT", 0x2000_c352_1f1c_15ab),
        ("5", 100_005, "ACGT", "ACGTACGT", 0x2800_c352_d8f2_d5b5),
        ("10", 100_010, "ACGTACGT", "CGTACGTA", 0x5000_c355_3bbf_9c19),
        ("22", 100_022, "ACGTACGT", "N", 0xb000_c35b_6469_0b25),
        ("X", 100_023, "AAAAAAAAGG", "AG", 0xb800_c35b_bcec_e603),
        ("Y", 100_024, "AG", "AAAAAAAAGG", 0xc000_c35c_6374_1ee7),
        ("MT", 100_025, "ACGT", "AAACCCGGGTTT", 0xc800_c35c_96c1_8499),
    ];

    // ==================== Chromosome Tests ====================

    #[test]
    fn test_encode_chrom() {
        assert_eq!(encode_chrom("1"), 1);
        assert_eq!(encode_chrom("22"), 22);
        assert_eq!(encode_chrom("chr7"), 7);
        assert_eq!(encode_chrom("CHR10"), 10);
        assert_eq!(encode_chrom("X"), 23);
        assert_eq!(encode_chrom("chrx"), 23);
        assert_eq!(encode_chrom("y"), 24);
        assert_eq!(encode_chrom("M"), 25);
        assert_eq!(encode_chrom("MT"), 25);
        assert_eq!(encode_chrom("chrMt"), 25);
    }

    #[test]
    fn test_encode_chrom_invalid() {
        assert_eq!(encode_chrom(""), CHROM_NA);
        assert_eq!(encode_chrom("chr"), CHROM_NA);
        assert_eq!(encode_chrom("NA"), CHROM_NA);
        assert_eq!(encode_chrom("1X"), CHROM_NA);
        assert_eq!(encode_chrom("26"), CHROM_NA);
        assert_eq!(encode_chrom("99999999999"), CHROM_NA);
        assert_eq!(encode_chrom("X "), CHROM_NA);
        assert_eq!(encode_chrom(" 1"), CHROM_NA);
        assert_eq!(encode_chrom("1 2"), CHROM_NA);
        assert_eq!(encode_chrom("MTX"), CHROM_NA);
    }

    #[test]
    fn test_decode_chrom() {
        assert_eq!(decode_chrom(0), "NA");
        assert_eq!(decode_chrom(1), "1");
        assert_eq!(decode_chrom(22), "22");
        assert_eq!(decode_chrom(23), "X");
        assert_eq!(decode_chrom(24), "Y");
        assert_eq!(decode_chrom(25), "MT");
        assert_eq!(decode_chrom(26), "NA");
        for code in 1..=CHROM_MAX {
            assert_eq!(encode_chrom(decode_chrom(code)), code);
        }
    }

    #[test]
    fn test_parse_chrom() {
        assert_eq!(parse_chrom("chrY").unwrap(), 24);
        assert!(matches!(
            parse_chrom("chr 1"),
            Err(crate::Error::CodecError(CodecError::InvalidChromosome(_)))
        ));
    }

    // ==================== REF+ALT Tests ====================

    #[test]
    fn test_encode_refalt_reversible() {
        assert_eq!(encode_refalt("AC", "GT"), 0x110d_8000);
        assert_eq!(encode_refalt("ac", "gt"), 0x110d_8000);
        assert!(!is_reversible_refalt(encode_refalt("", "")));
        assert!(is_reversible_refalt(encode_refalt("ACGTACGTAC", "G")));
    }

    #[test]
    fn test_encode_refalt_hash() {
        assert_eq!(encode_refalt("N", "A"), 0x13ac_e339);
        assert_eq!(encode_refalt("AAGAAAGAAAG", "A"), 0x7f91_cdb1);
        assert_eq!(encode_refalt("ACGT", "AAACCCGGGTTT"), 0x16c1_8499);
        assert_eq!(encode_refalt("ACGTACGT", "N"), 0x6469_0b25);
        assert!(!is_reversible_refalt(encode_refalt("ACGTACGTAC", "GT")));
    }

    #[test]
    fn test_decode_refalt() {
        let (r, a) = decode_refalt(0x110d_8000).unwrap();
        assert_eq!(r, "AC");
        assert_eq!(a, "GT");
        assert_eq!(decode_refalt(encode_refalt("N", "A")), None);
        let (r, a) = decode_refalt(encode_refalt("acgtac", "GGTTA")).unwrap();
        assert_eq!(r, "ACGTAC");
        assert_eq!(a, "GGTTA");
        let (r, a) = decode_refalt(encode_refalt("T", "")).unwrap();
        assert_eq!(r, "T");
        assert_eq!(a, "");
    }

    #[test]
    fn test_decode_refalt_oversized_lengths() {
        // lengths 15 + 15 with the reversible bit clear
        assert_eq!(decode_refalt(0x7FFF_FFFE), None);
        assert_eq!(decode_refalt(0x6000_0000), None);
        let (r, a) = decode_refalt(0x5800_0000).unwrap();
        assert_eq!(r.len(), 11);
        assert!(a.is_empty());

        let variant = reverse_variantkey(0x0800_0000_7FFF_FFFE);
        assert_eq!(variant.chrom, "1");
        assert_eq!(variant.pos, 0);
        assert!(variant.ref_allele.is_empty());
        assert!(variant.alt_allele.is_empty());
    }

    #[test]
    fn test_encode_refalt_empty_alleles() {
        let code = encode_refalt("", "");
        assert_eq!(code & 0x1, 0x1);
        assert_ne!(code, 0);
        assert_eq!(decode_refalt(code), None);
        assert!(is_reversible_refalt(encode_refalt("A", "")));
    }

    #[test]
    fn test_reversible_ref_length() {
        assert_eq!(reversible_ref_length(0x1916_0000), 3);
        assert_eq!(reversible_ref_length(encode_refalt("ACGTA", "C")), 5);
    }

    // ==================== VariantKey Tests ====================

    #[test]
    fn test_variantkey() {
        assert_eq!(variantkey("X", 12345, "AC", "GT"), 13_258_623_813_950_472_192);
        assert_eq!(encode_variantkey(23, 12345, 286_097_408), 0xB800_181C_910D_8000);
        for (chrom, pos, r, a, vk) in HASHED {
            assert_eq!(variantkey(chrom, pos, r, a), vk, "{chrom}:{pos}");
        }
    }

    #[test]
    fn test_decode_variantkey() {
        let parts = decode_variantkey(0xB800_181C_910D_8000);
        assert_eq!(
            parts,
            VariantKeyParts {
                chrom: 23,
                pos: 12345,
                refalt: 286_097_408
            }
        );
        assert_eq!(extract_variantkey_chrom(0xB800_181C_910D_8000), 23);
        assert_eq!(extract_variantkey_pos(0xB800_181C_910D_8000), 12345);
        assert_eq!(extract_variantkey_refalt(0xB800_181C_910D_8000), 286_097_408);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for (chrom, pos, r, a, _) in HASHED {
            let code = encode_chrom(chrom);
            let refalt = encode_refalt(r, a);
            let parts = decode_variantkey(encode_variantkey(code, pos, refalt));
            assert_eq!(parts.chrom, code);
            assert_eq!(parts.pos, pos);
            assert_eq!(parts.refalt, refalt);
        }
    }

    #[test]
    fn test_encode_truncates_fields() {
        let vk = encode_variantkey(1, MAX_POS + 1, u32::MAX);
        assert_eq!(extract_variantkey_chrom(vk), 1);
        assert_eq!(extract_variantkey_pos(vk), 0);
        assert_eq!(extract_variantkey_refalt(vk), 0x7FFF_FFFF);
    }

    #[test]
    fn test_reverse_variantkey() {
        let variant = reverse_variantkey(0xB800_181C_910D_8000);
        assert_eq!(variant.chrom, "X");
        assert_eq!(variant.pos, 12345);
        assert_eq!(variant.ref_allele, "AC");
        assert_eq!(variant.alt_allele, "GT");

        let variant = reverse_variantkey(0xb000_c35b_6469_0b25);
        assert_eq!(variant.chrom, "22");
        assert_eq!(variant.pos, 100_022);
        assert!(variant.ref_allele.is_empty());
        assert!(variant.alt_allele.is_empty());
    }

    #[test]
    fn test_chrom_ordering() {
        for chrom in 1..CHROM_MAX {
            let lo = encode_variantkey(chrom, MAX_POS, 0x7FFF_FFFF);
            let hi = encode_variantkey(chrom + 1, 0, 0);
            assert!(lo < hi);
        }
    }

    #[test]
    fn test_variantkey_range() {
        let range = variantkey_range(23, 1234, 5678);
        assert_eq!(range.min, 0xB800_0269_0000_0000);
        assert_eq!(range.max, 0xB800_0B17_7FFF_FFFF);
        assert!(range.contains(variantkey("X", 1234, "A", "C")));
        assert!(range.contains(variantkey("X", 5678, "ACGTACGT", "N")));
        assert!(!range.contains(variantkey("X", 5679, "A", "C")));
        assert!(!range.contains(variantkey("Y", 2000, "A", "C")));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            compare_variantkey_chrom(0xB800_0269_0000_0000, 0xB800_0B17_7FFF_FFFF),
            Ordering::Equal
        );
        assert_eq!(
            compare_variantkey_chrom_pos(0xB800_0269_0000_0000, 0xB800_0B17_7FFF_FFFF),
            Ordering::Less
        );
        assert_eq!(
            compare_variantkey_chrom(0xC000_0000_0000_0000, 0xB800_0B17_7FFF_FFFF),
            Ordering::Greater
        );
        assert_eq!(
            compare_variantkey_chrom_pos(0xB800_0269_0000_0001, 0xB800_0269_7FFF_FFFF),
            Ordering::Equal
        );
    }

    #[test]
    fn test_chrom_startpos() {
        assert_eq!(
            get_variantkey_chrom_startpos(0x0800_c350_93ac_e339),
            (1 << 28) | 100_001
        );
    }

    #[test]
    fn test_hex() {
        assert_eq!(variantkey_hex(13_258_623_813_950_472_192), "b800181c910d8000");
        assert_eq!(
            parse_variantkey_hex("b800181c910d8000").unwrap(),
            13_258_623_813_950_472_192
        );
        for (.., vk) in HASHED {
            assert_eq!(parse_variantkey_hex(&variantkey_hex(vk)).unwrap(), vk);
        }
    }
}
