// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bucket::{self, RADIX_COUNT},
    file::{fsync_directory, spill_file_path},
    meta::{Metadata, FORMAT_VERSION},
    slot::{Encode, Slot, SLOT_SIZE},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Size of the write buffer for the main data file.
const DATA_WRITE_BUFFER_SIZE: usize = 16 * 1_024 * 1_024;

/// Size of the write buffer for each of the 256 radix spill files.
const SPILL_WRITE_BUFFER_SIZE: usize = 64 * 1_024;

/// Streams records into a new hash file and seals it into its final
/// immutable layout.
///
/// While records are appended, their `(hash, position)` pairs are spilled to
/// 256 radix-sharded side files, so the writer never holds more than one
/// radix worth of index pairs in memory. Sealing merges the spill files into
/// the open-addressed hash-table segment at the tail of the file and patches
/// the header last.
///
/// Two bounds follow from the merge working on one in-memory image per
/// radix: a single radix may not exceed 2^31 bytes of pairs (~3.4 * 10^10
/// records in total), and the bucket count is capped at 2^28.
///
/// A writer that is dropped without [`Writer::finish`] or [`Writer::abort`]
/// leaves its spill files and the partial output behind.
pub struct Writer {
    /// Path of the data file being built
    path: PathBuf,

    /// Writer of the data segment
    data_writer: BufWriter<File>,

    /// One append-only spill writer per radix
    spill_writers: Vec<BufWriter<File>>,

    /// log2 of the number of buckets
    bucket_power: u8,

    /// Number of entries hashed into each bucket
    bucket_counts: Vec<u64>,

    /// Number of records appended so far
    item_count: u64,

    /// Absolute file position of the next record
    position: u64,

    /// Whether `finish` has run
    is_sealed: bool,
}

impl Writer {
    /// Sets up a new `Writer` at the given path.
    ///
    /// `expected_elements` sizes the bucket table; the header region is
    /// derived from it and reserved (zero-filled) immediately, records
    /// follow it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidBucketPower` if `expected_elements` would need
    /// more than 2^28 buckets, or with `Io` if the output or spill files
    /// cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, expected_elements: u64) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let bucket_power = bucket::bucket_power_for(expected_elements)?;
        let buckets = bucket::bucket_count(bucket_power);
        let total_header_length = Metadata::total_header_length(bucket_power);

        let file = File::create(&path)?;
        let mut data_writer = BufWriter::with_capacity(DATA_WRITE_BUFFER_SIZE, file);

        // Reserve the header region; it is patched during sealing
        let zeroes = [0u8; 8_192];
        let mut remaining = total_header_length;
        while remaining > 0 {
            let chunk = remaining.min(zeroes.len() as u64) as usize;
            data_writer.write_all(&zeroes[..chunk])?;
            remaining -= chunk as u64;
        }

        let mut spill_writers = Vec::with_capacity(RADIX_COUNT);
        for radix in 0..=u8::MAX {
            let file = File::create(spill_file_path(&path, radix))?;
            spill_writers.push(BufWriter::with_capacity(SPILL_WRITE_BUFFER_SIZE, file));
        }

        log::trace!(
            "creating hash file at {path:?} with 2^{bucket_power} buckets, {total_header_length}B header",
        );

        Ok(Self {
            path,
            data_writer,
            spill_writers,
            bucket_power,
            bucket_counts: vec![0; buckets as usize],
            item_count: 0,
            position: total_header_length,
            is_sealed: false,
        })
    }

    /// Adds a record.
    ///
    /// Records keep their insertion order in the data segment; duplicate
    /// keys are preserved as distinct records.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadySealed` after [`Writer::finish`], with
    /// `RecordTooLarge` if a length does not fit the 32-bit record framing,
    /// with `Overflow` if the file would grow past 2^63 bytes, or with `Io`.
    /// After an I/O error the writer is poisoned; no recovery is attempted.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> crate::Result<()> {
        if self.is_sealed {
            return Err(crate::Error::AlreadySealed);
        }

        let key_len = i32::try_from(key.len()).map_err(|_| crate::Error::RecordTooLarge)?;
        let value_len = i32::try_from(value.len()).map_err(|_| crate::Error::RecordTooLarge)?;

        self.data_writer.write_i32::<BigEndian>(key_len)?;
        self.data_writer.write_i32::<BigEndian>(value_len)?;
        self.data_writer.write_all(key)?;
        self.data_writer.write_all(value)?;

        let hash = crate::hash64(key);
        let radix = bucket::radix_of(hash);
        let bucket = bucket::bucket_of(hash, self.bucket_power);

        let spill_writer = &mut self.spill_writers[usize::from(radix)];
        spill_writer.write_u64::<BigEndian>(hash)?;
        spill_writer.write_u64::<BigEndian>(self.position)?;

        self.bucket_counts[bucket as usize] += 1;
        self.position = advance(self.position, 8 + key.len() as u64 + value.len() as u64)?;
        self.item_count += 1;

        Ok(())
    }

    /// Seals the file: merges the spill files into the hash-table segment,
    /// writes the bucket directory, patches the header and removes the
    /// spill files.
    ///
    /// Returns the number of records written. The writer is terminal
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadySealed` on a second call, with `RadixTooLarge` if
    /// a spill file outgrew its merge image, with
    /// `InternalInvariantViolated` if a pair cannot be placed, or with `Io`.
    /// On error the partial output and remaining spill files stay on disk;
    /// callers wanting atomicity should seal to a temporary path and rename.
    pub fn finish(&mut self) -> crate::Result<u64> {
        if self.is_sealed {
            return Err(crate::Error::AlreadySealed);
        }
        self.is_sealed = true;

        // Close the append-phase streams; the spill files are now read back
        self.data_writer.flush()?;
        for mut spill_writer in std::mem::take(&mut self.spill_writers) {
            spill_writer.flush()?;
        }

        let bucket_offsets = compute_bucket_offsets(&self.bucket_counts);
        let data_segment_end = self.position;

        // The hash-table segment continues directly past the data segment,
        // one radix image at a time
        for radix in 0..=u8::MAX {
            self.merge_radix(radix, &bucket_offsets)?;
        }
        self.data_writer.flush()?;

        log::trace!(
            "hash table segment: {} slots at {data_segment_end}",
            self.item_count
        );

        let file = self.data_writer.get_mut();
        file.seek(SeekFrom::Start(0))?;

        {
            let mut header_writer = BufWriter::new(&mut *file);

            let metadata = Metadata {
                version: FORMAT_VERSION,
                item_count: self.item_count,
                bucket_power: self.bucket_power,
            };
            metadata.encode_into(&mut header_writer)?;

            // Bucket directory: absolute slot-region offset and slot count
            // per bucket
            for (count, offset) in self.bucket_counts.iter().zip(&bucket_offsets) {
                header_writer.write_u64::<BigEndian>(data_segment_end + offset * SLOT_SIZE as u64)?;
                header_writer.write_u64::<BigEndian>(*count)?;
            }

            header_writer.flush()?;
        }

        file.sync_all()?;

        for radix in 0..=u8::MAX {
            std::fs::remove_file(spill_file_path(&self.path, radix))?;
        }

        // IMPORTANT: fsync folder on Unix
        if let Some(folder) = self.path.parent() {
            if !folder.as_os_str().is_empty() {
                fsync_directory(folder)?;
            }
        }

        log::debug!(
            "Sealed hash file {:?}: {} records, 2^{} buckets, {} bytes",
            self.path,
            self.item_count,
            self.bucket_power,
            data_segment_end + self.item_count * SLOT_SIZE as u64,
        );

        Ok(self.item_count)
    }

    /// Tears down an unfinished writer, removing the spill files and the
    /// partial output file.
    ///
    /// # Errors
    ///
    /// Fails with `Io` if a file cannot be removed.
    pub fn abort(self) -> crate::Result<()> {
        drop(self.data_writer);
        drop(self.spill_writers);

        for radix in 0..=u8::MAX {
            std::fs::remove_file(spill_file_path(&self.path, radix))?;
        }
        std::fs::remove_file(&self.path)?;

        log::trace!("aborted hash file at {:?}", self.path);

        Ok(())
    }

    /// Merges one radix spill file into its slot image and appends the
    /// image to the data file.
    fn merge_radix(&mut self, radix: u8, bucket_offsets: &[u64]) -> crate::Result<()> {
        let spill_path = spill_file_path(&self.path, radix);
        let mut spill_file = File::open(&spill_path)?;

        let len = spill_file.metadata()?.len();
        check_spill_length(len, radix)?;
        if len == 0 {
            return Ok(());
        }

        let mut input = Vec::with_capacity(len as usize);
        spill_file.read_to_end(&mut input)?;

        let entries = input.len() / SLOT_SIZE;
        let mut image = vec![Slot::default(); entries];

        let mut reader: &[u8] = &input;
        for _ in 0..entries {
            let hash = reader.read_u64::<BigEndian>()?;
            let position = reader.read_u64::<BigEndian>()?;
            self.place(hash, position, bucket_offsets, &mut image)?;
        }

        for slot in &image {
            slot.encode_into(&mut self.data_writer)?;
        }

        log::trace!("merged radix {radix:02X}: {entries} pairs");

        Ok(())
    }

    /// Places one `(hash, position)` pair into its bucket's region of the
    /// radix slot image, linear-probing within the region only.
    fn place(
        &self,
        hash: u64,
        position: u64,
        bucket_offsets: &[u64],
        image: &mut [Slot],
    ) -> crate::Result<()> {
        let bucket = bucket::bucket_of(hash, self.bucket_power) as usize;
        let base_bucket = bucket::base_bucket_of(hash, self.bucket_power) as usize;

        // Offset of this bucket's slot region inside the radix image, in
        // slots; buckets of one radix are laid out back to back
        let region_start = (bucket_offsets[bucket] - bucket_offsets[base_bucket]) as usize;
        let len = self.bucket_counts[bucket] as usize;

        let mut index = region_start + bucket::initial_probe(hash, len as u64) as usize;

        for _ in 0..len {
            let slot = &mut image[index];

            if slot.is_vacant() {
                *slot = Slot { hash, position };
                return Ok(());
            }

            if len == 1 {
                return Err(crate::Error::InternalInvariantViolated);
            }

            index += 1;
            if index >= region_start + len {
                index = region_start;
            }
        }

        Err(crate::Error::InternalInvariantViolated)
    }
}

/// Rejects spill files too large to merge.
///
/// One merge image is indexed with 32-bit arithmetic, so a radix may hold at
/// most `i32::MAX` bytes of pairs.
fn check_spill_length(len: u64, radix: u8) -> crate::Result<()> {
    if len > i32::MAX as u64 {
        return Err(crate::Error::RadixTooLarge(radix));
    }
    Ok(())
}

/// Advances a file position, rejecting growth past the maximum file size.
fn advance(position: u64, count: u64) -> crate::Result<u64> {
    position
        .checked_add(count)
        .filter(|pos| *pos <= i64::MAX as u64)
        .ok_or(crate::Error::Overflow)
}

/// Exclusive prefix sum of the bucket counts: the slot index at which each
/// bucket's region begins within the hash-table segment.
fn compute_bucket_offsets(bucket_counts: &[u64]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(bucket_counts.len());
    let mut current = 0;

    for count in bucket_counts {
        offsets.push(current);
        current += count;
    }

    offsets
}
