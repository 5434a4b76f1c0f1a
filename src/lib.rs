// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An immutable, on-disk, content-addressed hash file.
//!
//! ##### About
//!
//! This crate exports a [`Writer`] that streams an unbounded number of
//! key/value records into a single file, and a [`HashFile`] that performs
//! O(1)-expected random lookups against the sealed result.
//!
//! The format is inspired by DJB's CDB, generalized to 64-bit hash codes and
//! 64-bit file offsets. The file is written in one sealing pass: records are
//! appended to the data segment while `(hash, position)` pairs are spilled
//! into 256 radix-sharded side files, so memory usage stays independent of
//! the number of records. Sealing merges the spill files into an
//! open-addressed hash-table segment at the tail of the file, writes the
//! bucket directory, and patches the header last.
//!
//! Once sealed, the file is a read-only artifact; there are no in-place
//! updates. Duplicate keys are preserved as distinct records.
//!
//! Keys and values are limited to 2^31 - 1 bytes each, files to 2^63 bytes.
//!
//! # Example usage
//!
//! ```
//! use hash_file::{HashFile, Writer};
//! #
//! # let folder = tempfile::tempdir()?;
//! let path = folder.path().join("users.hf");
//!
//! // Stream records into the file, then seal it
//! let mut writer = Writer::new(&path, /* expected elements */ 100)?;
//! writer.add(b"alice", b"builder")?;
//! writer.add(b"bob", b"reader")?;
//! writer.finish()?;
//!
//! // Sealed files answer point lookups through a single handle
//! let mut file = HashFile::open(&path)?;
//! assert_eq!(Some(b"builder".to_vec()), file.get(b"alice")?);
//! assert_eq!(None, file.get(b"carol")?);
//!
//! // All records can be walked in insertion order
//! assert_eq!(2, file.iter()?.count());
//! #
//! # Ok::<(), hash_file::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

#[doc(hidden)]
pub mod bucket;

mod error;

#[doc(hidden)]
pub mod file;

mod hash;

#[doc(hidden)]
pub mod meta;

mod reader;

#[doc(hidden)]
pub mod slot;

mod writer;

pub use {
    error::{Error, Result},
    hash::{hash128, hash64},
    reader::{HashFile, RecordIter},
    writer::Writer,
};
