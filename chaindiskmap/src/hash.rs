//! Byte hash functions usable as the hash function of a [`ChainHashMap`].
//!
//! The hash function is never stored in a serialized image, only the
//! per-entry hashes it produced. Reopening an image requires the same
//! function, otherwise loading fails with [`ChainMapError::HashMismatch`].
//!
//! `djb`, `djb2` and `sdbm` widen every byte as a *signed* char before
//! mixing it in and "keep positive" the result by two's-complement negation
//! when the top bit is set. Both quirks are kept so that values are stable
//! across implementations of this hash family.
//!
//! [`ChainHashMap`]: crate::ChainHashMap
//! [`ChainMapError::HashMismatch`]: crate::ChainMapError::HashMismatch

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Signature of a byte hash function.
pub type HashFn = fn(&[u8]) -> u64;

/// Hash used when a table is created without an explicit hash function.
pub const DEFAULT_HASH: HashFn = psh;

const DJB_SEED: u64 = 5381;
const FNV_OFFSET_BASIS: u64 = 0xCBF29CE484222325;
const FNV_PRIME: u64 = 0x100000001B3;

#[inline]
fn widen_signed(byte: u8) -> u64 {
    byte as i8 as i64 as u64
}

#[inline]
fn keep_positive(v: u64) -> u64 {
    if (v as i64) < 0 { v.wrapping_neg() } else { v }
}

/// Dan Bernstein's hash, `h * 33 + c`.
pub fn djb(data: &[u8]) -> u64 {
    let hash = data.iter().fold(DJB_SEED, |h, &b| {
        (h << 5).wrapping_add(h).wrapping_add(widen_signed(b))
    });
    keep_positive(hash)
}

/// Like [`djb`], but the byte is mixed in with XOR, `(h * 33) ^ c`.
pub fn djb2(data: &[u8]) -> u64 {
    let hash = data
        .iter()
        .fold(DJB_SEED, |h, &b| (h << 5).wrapping_add(h) ^ widen_signed(b));
    keep_positive(hash)
}

/// The sdbm hash, `c + h * 65599` written as shifts.
pub fn sdbm(data: &[u8]) -> u64 {
    let hash = data.iter().fold(0u64, |h, &b| {
        widen_signed(b)
            .wrapping_add(h << 6)
            .wrapping_add(h << 16)
            .wrapping_sub(h)
    });
    keep_positive(hash)
}

#[inline]
fn get16(bytes: &[u8]) -> u32 {
    u16::from_le_bytes([bytes[0], bytes[1]]) as u32
}

/// Paul Hsieh's SuperFastHash. The result is 32 bits wide; the top bit may be set.
pub fn psh(data: &[u8]) -> u64 {
    if data.is_empty() {
        return 0;
    }

    let mut hash = data.len() as u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        hash = hash.wrapping_add(get16(&chunk[0..2]));
        let tmp = (get16(&chunk[2..4]) << 11) ^ hash;
        hash = (hash << 16) ^ tmp;
        hash = hash.wrapping_add(hash >> 11);
    }

    let rem = chunks.remainder();
    match rem.len() {
        3 => {
            hash = hash.wrapping_add(get16(&rem[0..2]));
            hash ^= hash << 16;
            hash ^= ((rem[2] as i8 as i32) << 18) as u32;
            hash = hash.wrapping_add(hash >> 11);
        }
        2 => {
            hash = hash.wrapping_add(get16(rem));
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        1 => {
            hash = hash.wrapping_add(rem[0] as i8 as i32 as u32);
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    // final avalanche
    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);

    hash as u64
}

/// Standard 64-bit Fowler–Noll–Vo, FNV-1a ordering (xor, then multiply).
///
/// Not the same function as [`git`], which uses the 32-bit constants.
pub fn fnv1a(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |h, &b| {
        (h ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}

/// The hash Git uses for its name tables: FNV-1 ordering (multiply, then xor)
/// with the 32-bit offset basis and prime, accumulated in 64 bits.
pub fn git(data: &[u8]) -> u64 {
    data.iter().fold(0x811c_9dc5_u64, |h, &b| {
        h.wrapping_mul(0x0100_0193) ^ b as u64
    })
}

/// The Fx hash from `rustc-hash`, fed the raw bytes.
///
/// Fast, but its output depends on the pointer width of the machine, so an
/// image hashed with `fx` only reopens on a machine of the same word size.
pub fn fx(data: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data);
    hasher.finish()
}
