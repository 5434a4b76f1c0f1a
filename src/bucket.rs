// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Bucket arithmetic shared by the writer and the reader.
//!
//! A hash code is split from the top: its top `P` bits select one of `2^P`
//! buckets, and its top 8 bits (the high byte of the bucket index) select
//! one of the 256 radix spill files. All buckets of one radix therefore form
//! a contiguous ascending run of bucket indices, which is what allows the
//! sealer to merge one radix at a time.

/// Smallest allowed bucket power.
pub const MIN_BUCKET_POWER: u8 = 8;

/// Largest allowed bucket power.
pub const MAX_BUCKET_POWER: u8 = 28;

/// Number of radix spill files, one per high byte of the hash.
pub const RADIX_COUNT: usize = 256;

/// Target average number of entries per bucket.
const ENTRIES_PER_BUCKET: u64 = 4;

/// Selects the bucket power for an expected element count: the smallest
/// power in `[8, 28]` whose bucket count keeps the average load at
/// [`ENTRIES_PER_BUCKET`].
///
/// # Errors
///
/// Fails with `InvalidBucketPower` if more than `2^28` buckets would be
/// needed.
pub fn bucket_power_for(expected_elements: u64) -> crate::Result<u8> {
    let needed_buckets = expected_elements.div_ceil(ENTRIES_PER_BUCKET);

    let mut power = MIN_BUCKET_POWER;
    while (1u64 << power) < needed_buckets {
        power += 1;
        if power > MAX_BUCKET_POWER {
            return Err(crate::Error::InvalidBucketPower(power));
        }
    }

    Ok(power)
}

/// Number of buckets for a bucket power.
#[must_use]
pub fn bucket_count(power: u8) -> u64 {
    1 << power
}

/// Bucket index of a hash: its top `power` bits.
#[must_use]
pub fn bucket_of(hash: u64, power: u8) -> u64 {
    hash >> (64 - power)
}

/// Radix of a hash: its top 8 bits.
#[must_use]
pub fn radix_of(hash: u64) -> u8 {
    (hash >> 56) as u8
}

/// First bucket index belonging to the same radix as `hash`, i.e. the bucket
/// index with its low `power - 8` bits cleared.
#[must_use]
pub fn base_bucket_of(hash: u64, power: u8) -> u64 {
    u64::from(radix_of(hash)) << (power - 8)
}

/// Initial probe position within a bucket of `len` slots.
///
/// The hash is treated as signed and its absolute value is taken, matching
/// the canonical probe function. `i64::MIN` maps onto `2^63`, which is a
/// deterministic in-range choice; the writer and every reader must agree on
/// this function, nothing else.
#[must_use]
pub fn initial_probe(hash: u64, len: u64) -> u64 {
    #[allow(clippy::cast_possible_wrap)]
    let magnitude = (hash as i64).unsigned_abs();
    magnitude % len
}
