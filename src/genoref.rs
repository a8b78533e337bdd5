//! Reference genome lookup and variant normalization
//!
//! A GenoRef file stores the concatenated sequences of chromosomes 1 to 25
//! (X = 23, Y = 24, MT = 25) behind a fixed header that indexes the start of
//! each chromosome:
//!
//! ```text
//! [magic: 7][version: 1][index: u64 x 27][sequences]
//! ```
//!
//! `index[c]` is the start of chromosome `c` relative to the sequence region, so
//! chromosome `c` spans `index[c]..index[c + 1]`, and `index[26]` is the total
//! sequence length. Chromosome 0 (NA) is always empty.

use std::io::Write;
use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::error::{HeaderError, ReadError, Result, WriteError};
use crate::mmap::MappedFile;
use crate::variantkey::{encode_chrom, encode_refalt, encode_variantkey, CHROM_MAX};

/// GenoRef file magic number
pub const GENOREF_MAGIC: &[u8; 7] = b"GENOREF";

/// GenoRef file format version
pub const GENOREF_VERSION: u8 = 1;

/// Number of entries in the chromosome index
pub const GENOREF_INDEX_LEN: usize = CHROM_MAX as usize + 2;

/// Size of the GenoRef header in bytes
pub const SIZE_GENOREF_HEADER: usize = size_of::<GenoRefHeader>();

/// The reference is consistent with the variant only through IUPAC ambiguity
pub const NORM_INCONSISTENT: i32 = 1;
/// REF and ALT were swapped
pub const NORM_SWAPPED: i32 = 1 << 1;
/// REF and ALT were replaced by their reverse strand complements
pub const NORM_FLIPPED: i32 = 1 << 2;
/// Both alleles were extended to the left with a reference base
pub const NORM_LEFT_EXTENDED: i32 = 1 << 3;
/// Common trailing bases were removed
pub const NORM_RIGHT_TRIMMED: i32 = 1 << 4;
/// Common leading bases were removed
pub const NORM_LEFT_TRIMMED: i32 = 1 << 5;

/// Reference check result: exact match
pub const REF_MATCH: i32 = 0;
/// Reference check result: match through IUPAC ambiguity codes only
pub const REF_AMBIGUOUS: i32 = 1;
/// Reference check result: mismatch
pub const REF_MISMATCH: i32 = -1;
/// Reference check result: the allele extends past the chromosome
pub const REF_OUT_OF_RANGE: i32 = -2;

/// Fixed-size header at the start of a GenoRef file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct GenoRefHeader {
    /// File magic number
    magic: [u8; 7],
    /// File version number
    pub version: u8,
    /// Start offset of each chromosome, plus the total length
    pub index: [u64; GENOREF_INDEX_LEN],
}

impl GenoRefHeader {
    fn new(index: [u64; GENOREF_INDEX_LEN]) -> Self {
        Self {
            magic: *GENOREF_MAGIC,
            version: GENOREF_VERSION,
            index,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads and validates a header
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too short, the magic number or version
    /// is unknown, or the index decreases.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(buffer) = bytes.get(..SIZE_GENOREF_HEADER) else {
            return Err(ReadError::FileTruncation(SIZE_GENOREF_HEADER).into());
        };
        let header: Self = bytemuck::pod_read_unaligned(buffer);
        if header.magic != *GENOREF_MAGIC {
            return Err(
                HeaderError::InvalidMagic(String::from_utf8_lossy(&header.magic).into_owned())
                    .into(),
            );
        }
        if header.version != GENOREF_VERSION {
            return Err(HeaderError::InvalidFormatVersion(header.version).into());
        }
        if let Some(chrom) = header.index.windows(2).position(|w| w[1] < w[0]) {
            return Err(HeaderError::UnsortedGenomeIndex(chrom + 1).into());
        }
        Ok(header)
    }
}

/// Outcome of [`GenoRef::normalize_variant`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedVariant {
    /// Bit mask of `NORM_*` flags, or a negative reference check code
    pub code: i32,
    pub pos: u32,
    pub ref_allele: String,
    pub alt_allele: String,
}

/// A memory-mapped reference genome
#[derive(Clone, Debug)]
pub struct GenoRef {
    file: MappedFile,
    index: [u64; GENOREF_INDEX_LEN],
}

impl GenoRef {
    /// Memory-maps and validates a GenoRef file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(MappedFile::open(path)?)
    }

    /// Loads a GenoRef image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_file(MappedFile::from_bytes(bytes)?)
    }

    /// Validates a GenoRef image held in a mapped buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the sequences described by
    /// the index extend past the end of the buffer.
    pub fn from_file(file: MappedFile) -> Result<Self> {
        let header = GenoRefHeader::from_bytes(&file)?;
        let total = header.index[GENOREF_INDEX_LEN - 1];
        let expected = (SIZE_GENOREF_HEADER as u64).saturating_add(total);
        if expected > file.len() as u64 {
            return Err(ReadError::FileTruncation(expected as usize).into());
        }
        tracing::debug!(bases = total, "loaded genome reference");
        Ok(Self {
            file,
            index: header.index,
        })
    }

    /// Absolute byte range of a chromosome, `None` for unknown codes
    fn chrom_bounds(&self, chrom: u8) -> Option<(u64, u64)> {
        let c = usize::from(chrom);
        if c >= GENOREF_INDEX_LEN - 1 {
            return None;
        }
        let base = SIZE_GENOREF_HEADER as u64;
        Some((base + self.index[c], base + self.index[c + 1]))
    }

    /// Number of bases of a chromosome
    #[must_use]
    pub fn chrom_len(&self, chrom: u8) -> u64 {
        self.chrom_bounds(chrom).map_or(0, |(start, end)| end - start)
    }

    /// Reference base at a 0-based position
    ///
    /// Returns 0 when the position lies outside the chromosome.
    #[must_use]
    pub fn get_genoref_seq(&self, chrom: u8, pos: u32) -> u8 {
        let Some((start, end)) = self.chrom_bounds(chrom) else {
            return 0;
        };
        let offset = start + u64::from(pos);
        if offset >= end {
            return 0;
        }
        self.file[offset as usize]
    }

    /// Checks an allele against the reference at a 0-based position
    ///
    /// Comparison is case-insensitive. Returns [`REF_MATCH`] when every base is
    /// identical, [`REF_AMBIGUOUS`] when some bases only agree through IUPAC
    /// ambiguity codes, [`REF_MISMATCH`] otherwise, and [`REF_OUT_OF_RANGE`] when
    /// the allele extends past the chromosome.
    #[must_use]
    pub fn check_reference(&self, chrom: u8, pos: u32, ref_allele: &str) -> i32 {
        let Some((start, end)) = self.chrom_bounds(chrom) else {
            return REF_OUT_OF_RANGE;
        };
        let offset = start + u64::from(pos);
        let bases = ref_allele.as_bytes();
        if offset + bases.len() as u64 > end {
            return REF_OUT_OF_RANGE;
        }
        let genome = &self.file[offset as usize..offset as usize + bases.len()];

        let mut ret = REF_MATCH;
        for (&base, &genome_base) in bases.iter().zip(genome) {
            let (base, genome_base) = (base.to_ascii_uppercase(), genome_base.to_ascii_uppercase());
            if base == genome_base {
                continue;
            }
            if !(iupac_covers(base, genome_base) || iupac_covers(genome_base, base)) {
                return REF_MISMATCH;
            }
            ret = REF_AMBIGUOUS;
        }
        ret
    }

    /// Normalizes a variant against the reference
    ///
    /// The variant is first made consistent with the reference, swapping the
    /// alleles or moving to the other strand when needed. Indels are then
    /// reduced to their minimal left-anchored form: alleles left empty are
    /// extended with the preceding reference base, common trailing bases are
    /// removed, then common leading bases are removed.
    ///
    /// # Returns
    ///
    /// The normalized variant, with `code` holding the `NORM_*` bit mask of the
    /// applied operations. On a negative code ([`REF_MISMATCH`] or
    /// [`REF_OUT_OF_RANGE`]) the input is returned unchanged.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use variantkey::{GenoRef, Result};
    /// # fn main() -> Result<()> {
    /// let genoref = GenoRef::open("genoref.bin")?;
    /// let norm = genoref.normalize_variant(13, 2, "CDE", "CFE");
    /// println!("{} {} {}", norm.pos, norm.ref_allele, norm.alt_allele);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn normalize_variant(
        &self,
        chrom: u8,
        pos: u32,
        ref_allele: &str,
        alt_allele: &str,
    ) -> NormalizedVariant {
        let unchanged = |code| NormalizedVariant {
            code,
            pos,
            ref_allele: ref_allele.to_string(),
            alt_allele: alt_allele.to_string(),
        };

        let mut code = 0;
        let mut status = self.check_reference(chrom, pos, ref_allele);
        if status == REF_OUT_OF_RANGE {
            return unchanged(status);
        }

        let (mut r, mut a) = (ref_allele.as_bytes().to_vec(), alt_allele.as_bytes().to_vec());
        if status < 0 {
            status = self.check_reference(chrom, pos, alt_allele);
            if status >= 0 {
                std::mem::swap(&mut r, &mut a);
                code |= NORM_SWAPPED;
            } else {
                let (fr, fa) = (flip_bases(&r), flip_bases(&a));
                if self.check_bases(chrom, pos, &fr) >= 0 {
                    (r, a) = (fr, fa);
                    code |= NORM_FLIPPED;
                } else if self.check_bases(chrom, pos, &fa) >= 0 {
                    (r, a) = (fa, fr);
                    code |= NORM_SWAPPED | NORM_FLIPPED;
                } else {
                    tracing::trace!(chrom, pos, "variant inconsistent with reference");
                    return unchanged(REF_MISMATCH);
                }
                status = self.check_bases(chrom, pos, &r);
            }
        }
        if status == REF_AMBIGUOUS {
            code |= NORM_INCONSISTENT;
        }

        let mut pos = pos;
        if r.len() != 1 || a.len() != 1 {
            loop {
                if (r.is_empty() || a.is_empty()) && pos > 0 {
                    pos -= 1;
                    let base = self.get_genoref_seq(chrom, pos);
                    r.insert(0, base);
                    a.insert(0, base);
                    code |= NORM_LEFT_EXTENDED;
                } else if r.len() > 1
                    && a.len() > 1
                    && r[r.len() - 1].eq_ignore_ascii_case(&a[a.len() - 1])
                {
                    r.pop();
                    a.pop();
                    code |= NORM_RIGHT_TRIMMED;
                } else {
                    break;
                }
            }

            let offset = r
                .iter()
                .zip(&a)
                .take(r.len().min(a.len()).saturating_sub(1))
                .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
                .count();
            if offset > 0 {
                r.drain(..offset);
                a.drain(..offset);
                pos += offset as u32;
                code |= NORM_LEFT_TRIMMED;
            }
        }

        NormalizedVariant {
            code,
            pos,
            ref_allele: String::from_utf8_lossy(&r).into_owned(),
            alt_allele: String::from_utf8_lossy(&a).into_owned(),
        }
    }

    fn check_bases(&self, chrom: u8, pos: u32, bases: &[u8]) -> i32 {
        self.check_reference(chrom, pos, &String::from_utf8_lossy(bases))
    }

    /// Normalizes a variant and encodes it as a VariantKey
    ///
    /// `posindex` is the index of the first position in the input coordinate
    /// system: 0 for 0-based input, 1 for 1-based input (such as VCF).
    ///
    /// # Returns
    ///
    /// The VariantKey and the normalization code. A negative code means the
    /// variant could not be normalized and was encoded as given.
    #[must_use]
    pub fn normalized_variantkey(
        &self,
        chrom: &str,
        pos: u32,
        posindex: u8,
        ref_allele: &str,
        alt_allele: &str,
    ) -> (u64, i32) {
        let chrom = encode_chrom(chrom);
        let pos = pos.saturating_sub(u32::from(posindex));
        let norm = self.normalize_variant(chrom, pos, ref_allele, alt_allele);
        let vk = encode_variantkey(
            chrom,
            norm.pos,
            encode_refalt(&norm.ref_allele, &norm.alt_allele),
        );
        (vk, norm.code)
    }
}

/// IUPAC nucleotide code as a bit set of A=1, C=2, G=4, T=8
///
/// Returns 0 for bytes that are not upper case IUPAC codes.
#[inline]
fn iupac_mask(base: u8) -> u8 {
    match base {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        b'M' => 0b0011,
        b'R' => 0b0101,
        b'W' => 0b1001,
        b'S' => 0b0110,
        b'Y' => 0b1010,
        b'K' => 0b1100,
        b'V' => 0b0111,
        b'H' => 0b1011,
        b'D' => 0b1101,
        b'B' => 0b1110,
        b'N' => 0b1111,
        _ => 0,
    }
}

/// Checks whether the degenerate `code` accepts `other`
///
/// `N` accepts anything, the three-base codes accept any nucleotide code except
/// the base they exclude, and the two-base codes accept only their own plain
/// bases.
fn iupac_covers(code: u8, other: u8) -> bool {
    let (mask, other_mask) = (iupac_mask(code), iupac_mask(other));
    match mask.count_ones() {
        4 => true,
        3 => other_mask != 0 && other_mask != !mask & 0b1111,
        2 => other_mask.count_ones() == 1 && mask & other_mask != 0,
        _ => false,
    }
}

#[inline]
fn flip_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'M' => b'K',
        b'K' => b'M',
        b'R' => b'Y',
        b'Y' => b'R',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        other => other,
    }
}

fn flip_bases(bases: &[u8]) -> Vec<u8> {
    bases.iter().map(|&b| flip_base(b)).collect()
}

/// Complements every base of an allele, folding to upper case
///
/// `W`, `S`, `N` and any other letter map to themselves, other characters are
/// kept unchanged.
#[must_use]
pub fn flip_allele(allele: &str) -> String {
    allele
        .chars()
        .map(|c| match u8::try_from(c) {
            Ok(b) if b.is_ascii() => char::from(flip_base(b)),
            _ => c,
        })
        .collect()
}

/// Builder for GenoRef files
///
/// Sequences are pushed in ascending chromosome order. Chromosomes that are not
/// pushed are stored empty.
#[derive(Debug, Default, Clone)]
pub struct GenoRefWriter {
    lengths: [u64; GENOREF_INDEX_LEN - 1],
    sequences: Vec<u8>,
    last_chrom: u8,
}

impl GenoRefWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the sequence of a chromosome
    ///
    /// # Errors
    ///
    /// Returns `WriteError::UnsortedChromosome` if `chrom` is not greater than the
    /// previously pushed chromosome or lies outside `1..=25`.
    pub fn push(&mut self, chrom: u8, sequence: &[u8]) -> Result<()> {
        if chrom <= self.last_chrom || chrom > CHROM_MAX {
            return Err(WriteError::UnsortedChromosome(chrom).into());
        }
        self.lengths[usize::from(chrom)] = sequence.len() as u64;
        self.sequences.extend_from_slice(sequence);
        self.last_chrom = chrom;
        Ok(())
    }

    /// Writes the header and sequences and returns the number of bytes written
    pub fn write<W: Write>(&self, inner: &mut W) -> Result<usize> {
        let mut index = [0u64; GENOREF_INDEX_LEN];
        for (c, len) in self.lengths.iter().enumerate() {
            index[c + 1] = index[c] + len;
        }
        let header = GenoRefHeader::new(index);
        inner.write_all(header.as_bytes())?;
        inner.write_all(&self.sequences)?;
        Ok(SIZE_GENOREF_HEADER + self.sequences.len())
    }

    /// Writes the file into a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(SIZE_GENOREF_HEADER + self.sequences.len());
        self.write(&mut buffer)?;
        Ok(buffer)
    }
}
