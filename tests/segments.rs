use anyhow::Result;
use shardpipe::{RecordReader, SegmentedFile, plan_segments};
use std::fs;

fn lines(count: usize, width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * (width + 1));
    for i in 0..count {
        let line = format!("{i:0width$}");
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

#[test]
fn segments_are_contiguous_and_delimiter_aligned() {
    let data = lines(1000, 9);
    let segments = plan_segments(&data, 2000, 4, b'\n');

    assert!(segments.len() > 1);
    assert_eq!(segments[0].offset, 0);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].limit(), pair[1].offset);
        // Every interior boundary sits just past a delimiter.
        assert_eq!(data[pair[1].offset as usize - 1], b'\n');
    }
    assert_eq!(segments.last().unwrap().limit(), data.len() as u64);
}

#[test]
fn empty_file_yields_one_zero_size_segment() {
    let segments = plan_segments(&[], 100, 4, b'\n');
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].offset, 0);
    assert_eq!(segments[0].size, 0);
}

#[test]
fn small_file_yields_one_segment() {
    let data = lines(10, 4);
    let segments = plan_segments(&data, 1 << 20, 4, b'\n');
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].size, data.len() as u64);
}

#[test]
fn segment_records_reconstruct_the_file() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.txt");
    let data = lines(5000, 7);
    fs::write(&path, &data)?;

    let file = SegmentedFile::open(&path, 4000, 4, b'\n')?;
    assert!(file.segments().len() > 1);

    let mut rebuilt = Vec::<Vec<u8>>::new();
    for mut reader in file.readers() {
        while let Some(record) = reader.read()? {
            rebuilt.push(record);
        }
        reader.close()?;
    }

    let expected: Vec<Vec<u8>> = (0..5000).map(|i| format!("{i:07}").into_bytes()).collect();
    assert_eq!(rebuilt, expected);
    Ok(())
}

// 10 MB of 100-byte lines, 3 MB target, parallelism 2: the candidate count
// grows 1 -> 2 -> 4 and settles at four delimiter-aligned segments.
#[test]
fn ten_megabyte_file_plans_four_segments() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("big.txt");
    let data = lines(100_000, 99);
    assert_eq!(data.len(), 10_000_000);
    fs::write(&path, &data)?;

    let file = SegmentedFile::open(&path, 3_000_000, 2, b'\n')?;
    let segments = file.segments();
    assert_eq!(segments.len(), 4);
    for segment in &segments[..3] {
        assert!(segment.size <= 3_000_000);
    }

    let mut total_records = 0usize;
    let mut last: Option<Vec<u8>> = None;
    for mut reader in file.readers() {
        while let Some(record) = reader.read()? {
            // Offset order over segments preserves line order.
            if let Some(prev) = &last {
                assert!(prev < &record);
            }
            last = Some(record);
            total_records += 1;
        }
    }
    assert_eq!(total_records, 100_000);
    Ok(())
}

#[test]
fn unterminated_trailing_record_is_returned() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("tail.txt");
    fs::write(&path, b"first\nsecond")?;

    let file = SegmentedFile::open(&path, 1 << 20, 2, b'\n')?;
    let mut reader = file.reader(0)?;
    assert_eq!(reader.read()?, Some(b"first".to_vec()));
    assert_eq!(reader.read()?, Some(b"second".to_vec()));
    assert_eq!(reader.read()?, None);
    Ok(())
}

#[test]
fn reader_index_out_of_range_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("one.txt");
    fs::write(&path, b"only\n")?;

    let file = SegmentedFile::open(&path, 1 << 20, 2, b'\n')?;
    assert!(file.reader(5).is_err());
    Ok(())
}
