//! Murmur-family key hashing (MurmurHash3, x64 variant, 128-bit, seed 0).
//!
//! The bucket mapping of a sealed file must stay invariant across platforms
//! and toolchains, so the hash is implemented here instead of delegating to
//! `std`'s unspecified default hasher.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Hashes a byte slice to the first 64 bits of its 128-bit hash code.
///
/// This is the hash function of the file format: it decides the radix, the
/// bucket and the probe position of every record.
#[must_use]
pub fn hash64(bytes: &[u8]) -> u64 {
    murmur3_x64_128(bytes).0
}

/// Hashes a byte slice to its full 128-bit hash code.
#[must_use]
pub fn hash128(bytes: &[u8]) -> u128 {
    let (h1, h2) = murmur3_x64_128(bytes);
    (u128::from(h1) << 64) | u128::from(h2)
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

fn mix_k1(mut k1: u64) -> u64 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(31);
    k1.wrapping_mul(C2)
}

fn mix_k2(mut k2: u64) -> u64 {
    k2 = k2.wrapping_mul(C2);
    k2 = k2.rotate_left(33);
    k2.wrapping_mul(C1)
}

/// Little-endian load of up to 8 bytes.
fn gather_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

fn murmur3_x64_128(bytes: &[u8]) -> (u64, u64) {
    let mut h1 = 0u64;
    let mut h2 = 0u64;

    let mut blocks = bytes.chunks_exact(16);

    for block in blocks.by_ref() {
        h1 ^= mix_k1(gather_le(&block[..8]));
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        h2 ^= mix_k2(gather_le(&block[8..]));
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    if tail.len() > 8 {
        h2 ^= mix_k2(gather_le(&tail[8..]));
    }
    if !tail.is_empty() {
        h1 ^= mix_k1(gather_le(&tail[..tail.len().min(8)]));
    }

    let len = bytes.len() as u64;
    h1 ^= len;
    h2 ^= len;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}
