use hash_file::{bucket, hash64, meta::Metadata, HashFile, Writer};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use test_log::test;

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn random_records(seed: u64, count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let key_len = (rng.next_u32() % 24 + 1) as usize;
            let value_len = (rng.next_u32() % 32) as usize;

            let mut key = vec![0; key_len];
            rng.fill_bytes(&mut key);

            let mut value = vec![0; value_len];
            rng.fill_bytes(&mut value);

            (key, value)
        })
        .collect()
}

#[test]
fn seal_empty_file() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("empty.hf");

    let mut writer = Writer::new(&path, 0)?;
    assert_eq!(0, writer.finish()?);

    let bytes = std::fs::read(&path)?;
    assert_eq!(Metadata::total_header_length(8), bytes.len() as u64);

    // magic, then version, then a zero record count
    assert_eq!(b"HSHFILE1", &bytes[..8]);
    assert_eq!(1, read_u64(&bytes, 8));
    assert_eq!(0, read_u64(&bytes, 16));

    let mut file = HashFile::open(&path)?;
    assert!(file.is_empty());
    assert_eq!(8, file.bucket_power());
    assert_eq!(None, file.get(b"anything")?);
    assert!(file.get_all(b"anything")?.is_empty());
    assert_eq!(0, file.iter()?.count());

    Ok(())
}

#[test]
fn seal_single_entry() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("single.hf");

    let mut writer = Writer::new(&path, 1)?;
    writer.add(b"a", b"b")?;
    assert_eq!(1, writer.finish()?);

    let total_header = Metadata::total_header_length(8);
    let data_segment_end = total_header + 8 + 2;

    let bytes = std::fs::read(&path)?;
    assert_eq!(data_segment_end + 16, bytes.len() as u64);

    // the one occupied slot points back at the record
    let hash = hash64(b"a");
    let slot_offset = data_segment_end as usize;
    assert_eq!(hash, read_u64(&bytes, slot_offset));
    assert_eq!(total_header, read_u64(&bytes, slot_offset + 8));

    // directory: the record's bucket has one slot, its neighbors none
    let bucket = bucket::bucket_of(hash, 8) as usize;
    let entry_offset = 28 + bucket * 16;
    assert_eq!(data_segment_end, read_u64(&bytes, entry_offset));
    assert_eq!(1, read_u64(&bytes, entry_offset + 8));

    let other = (bucket + 1) % 256;
    assert_eq!(0, read_u64(&bytes, 28 + other * 16 + 8));

    let mut file = HashFile::open(&path)?;
    assert_eq!(Some(b"b".to_vec()), file.get(b"a")?);
    assert_eq!(None, file.get(b"b")?);

    Ok(())
}

#[test]
fn seal_bucket_collision() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("collision.hf");

    // find two keys landing in the same bucket with distinct hashes
    let mut seen: HashMap<u64, (String, u64)> = HashMap::new();
    let mut pair = None;
    for i in 0u32.. {
        let key = format!("key-{i}");
        let hash = hash64(key.as_bytes());
        let bucket = bucket::bucket_of(hash, 8);

        if let Some((first_key, first_hash)) = seen.get(&bucket) {
            if *first_hash != hash {
                pair = Some(((first_key.clone(), *first_hash), (key, hash)));
                break;
            }
        } else {
            seen.insert(bucket, (key, hash));
        }
    }
    let ((key_1, hash_1), (key_2, hash_2)) = pair.unwrap();

    let mut writer = Writer::new(&path, 2)?;
    writer.add(key_1.as_bytes(), b"first")?;
    writer.add(key_2.as_bytes(), b"second")?;
    writer.finish()?;

    let bytes = std::fs::read(&path)?;
    let bucket = bucket::bucket_of(hash_1, 8) as usize;
    let entry_offset = 28 + bucket * 16;

    let region_offset = read_u64(&bytes, entry_offset) as usize;
    assert_eq!(2, read_u64(&bytes, entry_offset + 8));

    // the first pair sits on its initial probe, the second on the other slot
    let probe_1 = bucket::initial_probe(hash_1, 2) as usize;
    assert_eq!(hash_1, read_u64(&bytes, region_offset + probe_1 * 16));
    assert_eq!(hash_2, read_u64(&bytes, region_offset + (1 - probe_1) * 16));

    let total_header = Metadata::total_header_length(8);
    assert_eq!(
        total_header,
        read_u64(&bytes, region_offset + probe_1 * 16 + 8),
    );
    assert_eq!(
        total_header + 8 + key_1.len() as u64 + 5,
        read_u64(&bytes, region_offset + (1 - probe_1) * 16 + 8),
    );

    let mut file = HashFile::open(&path)?;
    assert_eq!(Some(b"first".to_vec()), file.get(key_1.as_bytes())?);
    assert_eq!(Some(b"second".to_vec()), file.get(key_2.as_bytes())?);

    Ok(())
}

#[test]
fn seal_duplicate_keys() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("dup.hf");

    let mut writer = Writer::new(&path, 2)?;
    writer.add(b"twice", b"one")?;
    writer.add(b"twice", b"two")?;
    writer.finish()?;

    let hash = hash64(b"twice");
    let bytes = std::fs::read(&path)?;

    let bucket = bucket::bucket_of(hash, 8) as usize;
    let entry_offset = 28 + bucket * 16;
    let region_offset = read_u64(&bytes, entry_offset) as usize;
    assert_eq!(2, read_u64(&bytes, entry_offset + 8));

    // both slots carry the same hash but point at distinct records
    assert_eq!(hash, read_u64(&bytes, region_offset));
    assert_eq!(hash, read_u64(&bytes, region_offset + 16));

    let position_1 = read_u64(&bytes, region_offset + 8);
    let position_2 = read_u64(&bytes, region_offset + 24);
    assert_ne!(position_1, position_2);

    let mut file = HashFile::open(&path)?;
    assert_eq!(Some(b"one".to_vec()), file.get(b"twice")?);
    assert_eq!(
        vec![b"one".to_vec(), b"two".to_vec()],
        file.get_all(b"twice")?,
    );

    Ok(())
}

#[test]
fn seal_is_deterministic() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path_1 = folder.path().join("a.hf");
    let path_2 = folder.path().join("b.hf");

    let records = random_records(0xC0FFEE, 10_000);

    for path in [&path_1, &path_2] {
        let mut writer = Writer::new(path, records.len() as u64)?;
        for (key, value) in &records {
            writer.add(key, value)?;
        }
        writer.finish()?;
    }

    assert_eq!(std::fs::read(&path_1)?, std::fs::read(&path_2)?);

    Ok(())
}

#[test]
fn seal_sizing() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("sized.hf");

    let mut writer = Writer::new(&path, 1_000_000)?;

    let mut data_bytes = 0u64;
    for x in 0u64..5_000 {
        let key = x.to_be_bytes();
        let value = nanoid::nanoid!();
        writer.add(&key, value.as_bytes())?;
        data_bytes += 8 + key.len() as u64 + value.len() as u64;
    }
    let count = writer.finish()?;
    assert_eq!(5_000, count);

    // smallest power in [8, 28] that keeps the average bucket load
    assert_eq!(18, bucket::bucket_power_for(1_000_000)?);

    let file = HashFile::open(&path)?;
    assert_eq!(18, file.bucket_power());

    let file_size = std::fs::metadata(&path)?.len();
    assert_eq!(
        Metadata::total_header_length(18) + data_bytes + count * 16,
        file_size,
    );

    Ok(())
}

#[test]
fn seal_twice_fails() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("twice.hf");

    let mut writer = Writer::new(&path, 0)?;
    writer.finish()?;

    assert!(matches!(
        writer.finish(),
        Err(hash_file::Error::AlreadySealed),
    ));

    Ok(())
}

#[test]
fn seal_removes_spill_files() -> hash_file::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("clean.hf");

    let mut writer = Writer::new(&path, 16)?;
    writer.add(b"k", b"v")?;
    writer.finish()?;

    let names: Vec<_> = std::fs::read_dir(folder.path())?
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(vec![std::ffi::OsString::from("clean.hf")], names);

    Ok(())
}
