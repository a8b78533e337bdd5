//! # VariantKey
//!
//! Sortable 64-bit keys for genetic variants and genomic regions, with
//! memory-mapped lookup tables.
//!
//! ## Overview
//!
//! A [VariantKey](mod@variantkey) packs a chromosome, a 0-based position and the REF
//! and ALT alleles of a variant into a single `u64`. Keys sort by chromosome and
//! then by position, so sorted arrays of keys can be binary searched by genomic
//! coordinate. Short alleles (up to 11 bases of `ACGT`) are stored reversibly;
//! longer alleles are hashed and can be recovered through an [`Nrvk`] table.
//!
//! ```text
//!  63    59                           31                               0
//! ┌───────┬────────────────────────────┬───────────────────────────────┐
//! │ CHROM │            POS             │            REF+ALT            │
//! │ 5 bit │           28 bit           │            31 bit             │
//! └───────┴────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! A [RegionKey](mod@regionkey) packs a chromosome, a `[start, end)` interval and a
//! strand the same way, so variants and regions share the chromosome and start
//! position prefix.
//!
//! ## Lookup tables
//!
//! All index files are immutable and little-endian. They are opened once,
//! memory-mapped, and shared across threads by cloning the handle:
//!
//! * [`Nrvk`] maps hashed VariantKeys back to their alleles;
//! * [`RvTable`] and [`VrTable`] link rsIDs and VariantKeys in both directions;
//! * [`GenoRef`] holds a reference genome used to [normalize](GenoRef::normalize_variant)
//!   variants before encoding them.
//!
//! Lookup tables are searched with the boundary [`BinSearch`] engine, which
//! works on any sorted array of fixed-width records in row or column layout.
//!
//! ## Example
//!
//! ```
//! use variantkey::{reverse_variantkey, variantkey, variantkey_hex};
//!
//! let vk = variantkey("X", 12345, "AC", "GT");
//! assert_eq!(variantkey_hex(vk), "b800181c910d8000");
//!
//! let variant = reverse_variantkey(vk);
//! assert_eq!(variant.chrom, "X");
//! assert_eq!(variant.ref_allele, "AC");
//! ```

pub mod binsearch;
pub mod error;
pub mod esid;
pub mod genoref;
pub mod hex;
pub mod mmap;
pub mod nrvk;
pub mod regionkey;
pub mod rsidvar;
pub mod table;
pub mod variantkey;

pub use binsearch::{BinSearch, KeyField, KeyWidth, SearchRange};
pub use error::{Error, Result};
pub use esid::{decode_string_id, encode_string_id, encode_string_num_id, hash_string_id};
pub use genoref::{flip_allele, GenoRef, GenoRefWriter, NormalizedVariant};
pub use mmap::MappedFile;
pub use nrvk::{Nrvk, NrvkWriter};
pub use regionkey::{
    are_overlapping_region_regionkey, are_overlapping_regionkeys, are_overlapping_regions,
    decode_regionkey, encode_regionkey, extend_regionkey, parse_regionkey_hex, regionkey,
    regionkey_hex, reverse_regionkey, Region, RegionKeyParts,
};
pub use rsidvar::{ChromPosRange, RvTable, RvWriter, VrTable, VrWriter};
pub use table::{Layout, TableKind};
pub use variantkey::{
    decode_chrom, decode_refalt, decode_variantkey, encode_chrom, encode_refalt,
    encode_variantkey, parse_chrom, parse_variantkey_hex, reverse_variantkey, variantkey,
    variantkey_hex, variantkey_range, Variant, VariantKeyParts, VariantKeyRange,
};
