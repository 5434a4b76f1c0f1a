// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bucket::{bucket_count, MAX_BUCKET_POWER, MIN_BUCKET_POWER},
    file::MAGIC_BYTES,
    slot::{Decode, Encode, SLOT_SIZE},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Current data format version.
pub const FORMAT_VERSION: u64 = 1;

/// The fixed-size file header, stored at offset zero ahead of the bucket
/// directory.
///
/// The header region (this struct plus the directory) is reserved when the
/// writer is constructed and patched as the very last step of sealing, so a
/// crashed seal is detectable by its zeroed magic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    /// Data format version
    pub version: u64,

    /// Number of records in the data segment
    pub item_count: u64,

    /// log2 of the number of buckets
    pub bucket_power: u8,
}

impl Metadata {
    /// Returns the on-disk size of the fixed header part.
    #[must_use]
    pub const fn serialized_len() -> usize {
        MAGIC_BYTES.len() + std::mem::size_of::<u64>() + std::mem::size_of::<u64>() + std::mem::size_of::<i32>()
    }

    /// Returns the byte length of the whole reserved header region: the
    /// fixed part plus the bucket directory.
    #[must_use]
    pub fn total_header_length(bucket_power: u8) -> u64 {
        Self::serialized_len() as u64 + bucket_count(bucket_power) * SLOT_SIZE as u64
    }
}

impl Encode for Metadata {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u64::<BigEndian>(self.version)?;
        writer.write_u64::<BigEndian>(self.item_count)?;
        writer.write_i32::<BigEndian>(i32::from(self.bucket_power))?;
        Ok(())
    }
}

impl Decode for Metadata {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        // Check magic
        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(crate::Error::InvalidHeader("Magic"));
        }

        let version = reader.read_u64::<BigEndian>()?;
        if version != FORMAT_VERSION {
            return Err(crate::Error::InvalidVersion(version));
        }

        let item_count = reader.read_u64::<BigEndian>()?;

        let bucket_power = reader.read_i32::<BigEndian>()?;
        if bucket_power < i32::from(MIN_BUCKET_POWER) || bucket_power > i32::from(MAX_BUCKET_POWER)
        {
            return Err(crate::Error::InvalidHeader("BucketPower"));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bucket_power = bucket_power as u8;

        Ok(Self {
            version,
            item_count,
            bucket_power,
        })
    }
}
