// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bucket,
    meta::Metadata,
    slot::{Decode, Slot, SLOT_SIZE},
};
use byteorder::{BigEndian, ReadBytesExt};
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// A sealed, immutable hash file opened for random lookups.
///
/// The bucket directory is held in memory; a lookup touches the file at most
/// twice per probed slot (slot read plus record read). Lookups probe with
/// the exact function the writer placed with, so a present key is found in
/// O(1) expected probes.
pub struct HashFile {
    /// Path the file was opened from
    path: PathBuf,

    /// Read handle used for slot and record reads
    file: File,

    /// Decoded file header
    metadata: Metadata,

    /// `(absolute byte offset, slot count)` per bucket
    directory: Vec<(u64, u64)>,
}

impl HashFile {
    /// Opens a sealed hash file and loads its bucket directory.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidHeader` or `InvalidVersion` if the file is not a
    /// sealed hash file (a crashed seal leaves the magic zeroed), or with
    /// `Io`.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        let (metadata, directory) = {
            let mut reader = BufReader::new(&file);
            let metadata = Metadata::decode_from(&mut reader)?;

            let buckets = bucket::bucket_count(metadata.bucket_power) as usize;
            let mut directory = Vec::with_capacity(buckets);

            for _ in 0..buckets {
                let offset = reader.read_u64::<BigEndian>()?;
                let len = reader.read_u64::<BigEndian>()?;
                directory.push((offset, len));
            }

            (metadata, directory)
        };

        log::trace!(
            "opened hash file {path:?}: {} records, 2^{} buckets",
            metadata.item_count,
            metadata.bucket_power,
        );

        Ok(Self {
            path,
            file,
            metadata,
            directory,
        })
    }

    /// Returns the value of the first record whose key equals `key`, if
    /// any.
    ///
    /// With duplicate keys, "first" follows the probe sequence, which is
    /// insertion order restricted to the key's bucket; [`HashFile::get_all`]
    /// retrieves every duplicate.
    ///
    /// # Errors
    ///
    /// Fails with `Io` (or `InvalidHeader` on a torn record frame).
    pub fn get(&mut self, key: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        let hash = crate::hash64(key);
        let (region_offset, len) = self.bucket_region(hash);

        if len == 0 {
            return Ok(None);
        }

        let start = bucket::initial_probe(hash, len);

        for step in 0..len {
            let slot_offset = region_offset + ((start + step) % len) * SLOT_SIZE as u64;
            let slot = self.read_slot(slot_offset)?;

            if slot.is_vacant() {
                return Ok(None);
            }

            if slot.hash == hash {
                let (record_key, value) = self.read_record(slot.position)?;
                if record_key == key {
                    return Ok(Some(value));
                }
            }
        }

        Ok(None)
    }

    /// Returns the values of every record whose key equals `key`, in probe
    /// order.
    ///
    /// # Errors
    ///
    /// Fails with `Io` (or `InvalidHeader` on a torn record frame).
    pub fn get_all(&mut self, key: &[u8]) -> crate::Result<Vec<Vec<u8>>> {
        let hash = crate::hash64(key);
        let (region_offset, len) = self.bucket_region(hash);

        let mut values = Vec::new();

        if len == 0 {
            return Ok(values);
        }

        let start = bucket::initial_probe(hash, len);

        for step in 0..len {
            let slot_offset = region_offset + ((start + step) % len) * SLOT_SIZE as u64;
            let slot = self.read_slot(slot_offset)?;

            if slot.is_vacant() {
                break;
            }

            if slot.hash == hash {
                let (record_key, value) = self.read_record(slot.position)?;
                if record_key == key {
                    values.push(value);
                }
            }
        }

        Ok(values)
    }

    /// Returns an iterator over all records in insertion order.
    ///
    /// The iterator reads from its own file handle, so it does not disturb
    /// lookups on this instance.
    ///
    /// # Errors
    ///
    /// Fails with `Io` if the file cannot be reopened.
    pub fn iter(&self) -> crate::Result<RecordIter> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(Metadata::total_header_length(
            self.metadata.bucket_power,
        )))?;

        Ok(RecordIter {
            reader,
            remaining: self.metadata.item_count,
        })
    }

    /// Number of records in the file.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.metadata.item_count
    }

    /// Whether the file contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.item_count == 0
    }

    /// log2 of the number of buckets.
    #[must_use]
    pub fn bucket_power(&self) -> u8 {
        self.metadata.bucket_power
    }

    /// Returns the slot region of the bucket a hash belongs to.
    fn bucket_region(&self, hash: u64) -> (u64, u64) {
        self.directory[bucket::bucket_of(hash, self.metadata.bucket_power) as usize]
    }

    fn read_slot(&mut self, offset: u64) -> crate::Result<Slot> {
        self.file.seek(SeekFrom::Start(offset))?;
        Slot::decode_from(&mut self.file)
    }

    fn read_record(&mut self, position: u64) -> crate::Result<(Vec<u8>, Vec<u8>)> {
        self.file.seek(SeekFrom::Start(position))?;
        read_framed_record(&mut self.file)
    }
}

/// Iterator over the framed records of a sealed hash file, in insertion
/// order.
pub struct RecordIter {
    reader: BufReader<File>,
    remaining: u64,
}

impl Iterator for RecordIter {
    type Item = crate::Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        Some(read_framed_record(&mut self.reader))
    }
}

/// Reads one `keyLen | valueLen | key | value` frame.
fn read_framed_record<R: Read>(reader: &mut R) -> crate::Result<(Vec<u8>, Vec<u8>)> {
    let key_len = reader.read_i32::<BigEndian>()?;
    let value_len = reader.read_i32::<BigEndian>()?;

    if key_len < 0 || value_len < 0 {
        return Err(crate::Error::InvalidHeader("RecordFrame"));
    }

    #[allow(clippy::cast_sign_loss)]
    let mut key = vec![0; key_len as usize];
    reader.read_exact(&mut key)?;

    #[allow(clippy::cast_sign_loss)]
    let mut value = vec![0; value_len as usize];
    reader.read_exact(&mut value)?;

    Ok((key, value))
}
