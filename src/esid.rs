//! Encoded String IDs
//!
//! An ESID stores a short identifier in a 64-bit integer. The top 4 bits hold the
//! number of characters, followed by up to 10 characters of 6 bits each taken
//! from the ASCII range `!` to `_` (lowercase letters are folded to uppercase
//! and control characters and space become `_`).
//!
//! Identifiers that look like `PREFIX<sep>DIGITS` and are longer than 10
//! characters can be stored with [`encode_string_num_id`]: up to 5 prefix
//! characters, the number of leading zeros (max 7) and a 27-bit number. Longer
//! identifiers can only be hashed with [`hash_string_id`].

/// Maximum number of characters of an encoded string
pub const ESID_MAX_LEN: usize = 10;

const ESID_SHIFT_LEN: u32 = 60;
const ESID_SHIFT_FIRST: u32 = 54;
const ESID_MAX_PREFIX: usize = 5;
const ESID_MAX_PAD: u64 = 7;
const ESID_SHIFT_PAD: u32 = 27;
const ESID_MASK_NUM: u64 = 0x07FF_FFFF;

#[inline]
fn encode_char(c: u8) -> u64 {
    let code = if c < b'!' {
        63
    } else if c > b'_' {
        c - 64
    } else {
        c - 32
    };
    u64::from(code & 0x3F)
}

#[inline]
fn decode_char(esid: u64, shift: u32) -> char {
    char::from(((esid >> shift) & 0x3F) as u8 + 32)
}

/// Encodes up to 10 characters of `s`, starting at byte `start`
///
/// Characters past the tenth are ignored.
#[must_use]
pub fn encode_string_id(s: &str, start: usize) -> u64 {
    let bytes = s.as_bytes().get(start..).unwrap_or_default();
    let bytes = &bytes[..bytes.len().min(ESID_MAX_LEN)];
    bytes.iter().enumerate().fold(
        (bytes.len() as u64) << ESID_SHIFT_LEN,
        |esid, (i, &c)| esid | (encode_char(c) << (ESID_SHIFT_FIRST - 6 * i as u32)),
    )
}

/// Encodes a `PREFIX<sep>DIGITS` identifier
///
/// Strings of up to 10 characters are encoded as plain strings. Longer strings
/// keep the first 5 characters before `sep`, up to 7 leading zeros of the
/// numeric part and the numeric value modulo 2^27.
///
/// # Example
///
/// ```
/// use variantkey::esid::{decode_string_id, encode_string_num_id};
///
/// let esid = encode_string_num_id("AbC:0012345678", b':');
/// assert_eq!(decode_string_id(esid), "ABC:0012345678");
/// ```
#[must_use]
pub fn encode_string_num_id(s: &str, sep: u8) -> u64 {
    let bytes = s.as_bytes();
    if bytes.len() <= ESID_MAX_LEN {
        return encode_string_id(s, 0);
    }

    let mut esid = 0;
    let mut nchr = 0;
    let mut pos = 0;
    while let Some(&c) = bytes.get(pos) {
        pos += 1;
        if c == sep {
            break;
        }
        if nchr < ESID_MAX_PREFIX {
            esid |= encode_char(c) << (ESID_SHIFT_FIRST - 6 * nchr as u32);
            nchr += 1;
        }
    }
    esid |= ((nchr + ESID_MAX_LEN) as u64) << ESID_SHIFT_LEN;

    let mut npad = 0;
    while npad < ESID_MAX_PAD && bytes.get(pos) == Some(&b'0') {
        npad += 1;
        pos += 1;
    }
    esid |= npad << ESID_SHIFT_PAD;

    let mut num: u32 = 0;
    while let Some(&c @ b'0'..=b'9') = bytes.get(pos) {
        num = num.wrapping_mul(10).wrapping_add(u32::from(c - b'0'));
        pos += 1;
    }
    esid | (u64::from(num) & ESID_MASK_NUM)
}

fn decode_chars(esid: u64, len: usize) -> String {
    (0..len)
        .map(|i| decode_char(esid, ESID_SHIFT_FIRST - 6 * i as u32))
        .collect()
}

/// Decodes an ESID produced by [`encode_string_id`] or [`encode_string_num_id`]
#[must_use]
pub fn decode_string_id(esid: u64) -> String {
    let len = (esid >> ESID_SHIFT_LEN) as usize;
    if len <= ESID_MAX_LEN {
        return decode_chars(esid, len);
    }
    let mut decoded = decode_chars(esid, len - ESID_MAX_LEN);
    decoded.push(':');
    let npad = ((esid >> ESID_SHIFT_PAD) & ESID_MAX_PAD) as usize;
    decoded.push_str(&"0".repeat(npad));
    let num = esid & ESID_MASK_NUM;
    if num > 0 {
        decoded.push_str(&num.to_string());
    }
    decoded
}

#[inline]
fn muxhash64(k: u64, h: u64) -> u64 {
    let k = k
        .wrapping_mul(0x87c3_7b91_1142_53d5)
        .rotate_right(33)
        .wrapping_mul(0x4cf5_ad43_2745_937f);
    (h ^ k)
        .rotate_right(37)
        .wrapping_mul(5)
        .wrapping_add(0x52dc_e729)
}

/// Hashes an arbitrary string into a 64-bit ID
///
/// The most significant bit of the result is always set.
#[must_use]
pub fn hash_string_id(s: &str) -> u64 {
    let mut h = s.as_bytes().chunks(8).fold(0, |h, chunk| {
        let mut block = [0u8; 8];
        block[..chunk.len()].copy_from_slice(chunk);
        muxhash64(u64::from_le_bytes(block), h)
    });
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h | 0x8000_0000_0000_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHANUM: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    // ==================== String ID Tests ====================

    #[test]
    fn test_encode_string_id() {
        assert_eq!(encode_string_id(ALPHANUM, 0), 0xa411_4935_1559_7619);
        assert_eq!(encode_string_id(ALPHANUM, 1), 0xa452_4d45_565d_8661);
        assert_eq!(encode_string_id("1", 0), 0x1440_0000_0000_0000);
        assert_eq!(encode_string_id("", 0), 0);
        assert_eq!(encode_string_id(" !\"#$%&'()", 0), 0xafc1_0831_0518_7209);
        assert_eq!(encode_string_id("\\]^_`abcde", 0), 0xaf3d_fbf8_218a_3925);
        assert_eq!(encode_string_id("A", 5), 0);
    }

    #[test]
    fn test_decode_string_id() {
        assert_eq!(decode_string_id(0xa411_4935_1559_7619), "0123456789");
        assert_eq!(decode_string_id(0xa452_4d45_565d_8661), "123456789A");
        assert_eq!(decode_string_id(0x1440_0000_0000_0000), "1");
        assert_eq!(decode_string_id(0), "");
        assert_eq!(decode_string_id(0xafc1_0831_0518_7209), "_!\"#$%&'()");
        assert_eq!(decode_string_id(0xaf3d_fbf8_218a_3925), "\\]^_@ABCDE");
    }

    #[test]
    fn test_string_id_lowercase_folding() {
        assert_eq!(encode_string_id("rs12345", 0), encode_string_id("RS12345", 0));
        assert_eq!(decode_string_id(encode_string_id("chr1", 0)), "CHR1");
    }

    // ==================== Numeric String ID Tests ====================

    #[test]
    fn test_encode_string_num_id() {
        assert_eq!(encode_string_num_id("AbC:12345678", b':'), 0xd862_8c00_00bc_614e);
        assert_eq!(encode_string_num_id("AbC:012345678", b':'), 0xd862_8c00_08bc_614e);
        assert_eq!(encode_string_num_id("AbCdE:12345678", b':'), 0xf862_8e49_40bc_614e);
        assert_eq!(encode_string_num_id("AbCdEfG:12345678", b':'), 0xf862_8e49_40bc_614e);
        assert_eq!(encode_string_num_id("AbC:0", b':'), 0x5862_8da4_0000_0000);
        assert_eq!(
            encode_string_num_id("AbCdE:0000000012345678", b':'),
            0xf862_8e49_78bc_614e
        );
    }

    #[test]
    fn test_decode_string_num_id() {
        assert_eq!(decode_string_id(0xd862_8c00_00bc_614e), "ABC:12345678");
        assert_eq!(decode_string_id(0xd862_8c00_08bc_614e), "ABC:012345678");
        assert_eq!(decode_string_id(0xf862_8e49_40bc_614e), "ABCDE:12345678");
        assert_eq!(decode_string_id(0x5862_8da4_0000_0000), "ABC:0");
        assert_eq!(
            decode_string_id(0xf862_8e49_78bc_614e),
            "ABCDE:000000012345678"
        );
    }

    #[test]
    fn test_string_num_id_zero_value() {
        let esid = encode_string_num_id("ENSG:000000000", b':');
        assert_eq!(decode_string_id(esid), "ENSG:0000000");
    }

    #[test]
    fn test_string_num_id_other_separator() {
        let esid = encode_string_num_id("rs_0000001234", b'_');
        assert_eq!(decode_string_id(esid), "RS:0000001234");
    }

    #[test]
    fn test_string_num_id_missing_separator() {
        let esid = encode_string_num_id("ABCDEFGHIJKLMNOP", b':');
        assert_eq!(decode_string_id(esid), "ABCDE:");
    }

    // ==================== Hash Tests ====================

    #[test]
    fn test_hash_string_id() {
        assert_eq!(hash_string_id(""), 0x8000_0000_0000_0000);
        assert_eq!(hash_string_id("1"), 0xfc73_100b_aa96_ad81);
        assert_eq!(hash_string_id("12345678"), 0xccbc_926a_73ec_e95c);
        assert_eq!(hash_string_id(ALPHANUM), 0xb3a5_fdb8_808c_b7dc);
    }

    #[test]
    fn test_hash_string_id_msb() {
        for s in ["a", "rs1", "ENST00000456328", ALPHANUM] {
            assert_ne!(hash_string_id(s) & 0x8000_0000_0000_0000, 0);
        }
        assert_ne!(hash_string_id("ab"), hash_string_id("ba"));
    }
}
