// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::{Path, PathBuf};

/// Magic bytes at the start of every sealed hash file.
pub const MAGIC_BYTES: [u8; 8] = [b'H', b'S', b'H', b'F', b'I', b'L', b'E', b'1'];

/// Returns the path of the transient spill file holding the
/// `(hash, position)` pairs of one radix.
#[must_use]
pub fn spill_file_path(data_file_path: &Path, radix: u8) -> PathBuf {
    let mut name = data_file_path.as_os_str().to_os_string();
    name.push(format!(".list.{radix:02X}"));
    PathBuf::from(name)
}

#[cfg(not(target_os = "windows"))]
#[allow(missing_docs)]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
#[allow(missing_docs)]
pub fn fsync_directory(_path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn spill_file_naming() {
        assert_eq!(
            PathBuf::from("data.hf.list.00"),
            spill_file_path(Path::new("data.hf"), 0),
        );
        assert_eq!(
            PathBuf::from("data.hf.list.0F"),
            spill_file_path(Path::new("data.hf"), 15),
        );
        assert_eq!(
            PathBuf::from("/tmp/db/data.hf.list.FF"),
            spill_file_path(Path::new("/tmp/db/data.hf"), 255),
        );
    }
}
