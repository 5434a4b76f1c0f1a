// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur while building or reading a hash file
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// The expected element count requires a bucket power outside the
    /// supported range
    InvalidBucketPower(u8),

    /// The writer is sealed; no further mutations are possible
    AlreadySealed,

    /// A file position would wrap past the maximum file size
    Overflow,

    /// Key or value length does not fit the 32-bit record framing
    RecordTooLarge,

    /// A single radix spill file outgrew what one merge image can hold
    RadixTooLarge(u8),

    /// Open addressing could not place a pair, meaning the bucket counts
    /// collected during the append phase do not match the spill files
    InternalInvariantViolated,

    /// Invalid or unparsable file header
    InvalidHeader(&'static str),

    /// Invalid or unsupported data format version
    InvalidVersion(u64),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashFileError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidBucketPower(_)
            | Self::AlreadySealed
            | Self::Overflow
            | Self::RecordTooLarge
            | Self::RadixTooLarge(_)
            | Self::InternalInvariantViolated
            | Self::InvalidHeader(_)
            | Self::InvalidVersion(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Hash file result
pub type Result<T> = std::result::Result<T, Error>;
