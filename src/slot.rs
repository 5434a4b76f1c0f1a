// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// On-disk size of a slot (and of a bucket directory entry).
pub const SLOT_SIZE: usize = 16;

/// Serialization into the sealed file's byte layout.
///
/// Implementors emit big-endian, fixed-width fields only; the number of
/// bytes written must match what the header reservation arithmetic assumes.
pub trait Encode {
    /// Writes the on-disk representation into `writer`.
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()>;
}

/// Deserialization from the sealed file's byte layout.
pub trait Decode {
    /// Reads the on-disk representation from `reader`.
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self>
    where
        Self: Sized;
}

/// A cell of the hash-table segment.
///
/// Pairs a 64-bit hash code with the absolute file position of the record it
/// belongs to. A position of zero marks a vacant cell; no record can live at
/// position zero because the header reserves the start of the file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Slot {
    /// Hash code of the record's key
    pub hash: u64,

    /// Absolute file position of the record, zero if vacant
    pub position: u64,
}

impl Slot {
    /// Returns `true` if no pair has been placed into this cell.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.position == 0
    }
}

impl Encode for Slot {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        writer.write_u64::<BigEndian>(self.hash)?;
        writer.write_u64::<BigEndian>(self.position)?;
        Ok(())
    }
}

impl Decode for Slot {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let hash = reader.read_u64::<BigEndian>()?;
        let position = reader.read_u64::<BigEndian>()?;
        Ok(Self { hash, position })
    }
}
