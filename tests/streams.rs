use anyhow::Result;
use shardpipe::{DelimReader, DelimWriter, RecordReader, RecordWriter, open_output, remove_tree};
use std::fs;
use std::io::Write;

#[test]
fn delimited_records_round_trip() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("records.txt");

    let mut writer = DelimWriter::create(&path, b'\n')?;
    for record in ["one", "two", "three"] {
        writer.write(record.as_bytes().to_vec())?;
    }
    writer.close()?;
    drop(writer);

    let mut reader = DelimReader::open(&path, b'\n')?;
    let mut out = Vec::new();
    while let Some(record) = reader.read()? {
        out.push(String::from_utf8(record)?);
    }
    assert_eq!(out, vec!["one", "two", "three"]);
    Ok(())
}

#[test]
fn final_record_without_delimiter_is_still_returned() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("tail.txt");
    fs::write(&path, b"a\nb\nc")?;

    let mut reader = DelimReader::open(&path, b'\n')?;
    assert_eq!(reader.read()?, Some(b"a".to_vec()));
    assert_eq!(reader.read()?, Some(b"b".to_vec()));
    assert_eq!(reader.read()?, Some(b"c".to_vec()));
    assert_eq!(reader.read()?, None);
    Ok(())
}

#[test]
fn empty_file_reads_no_records() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("empty.txt");
    fs::write(&path, b"")?;

    let mut reader = DelimReader::open(&path, b'\n')?;
    assert_eq!(reader.read()?, None);
    Ok(())
}

#[test]
fn writer_close_is_idempotent() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("out.txt");
    let mut writer = DelimWriter::create(&path, b'\n')?;
    writer.write(b"x".to_vec())?;
    writer.close()?;
    writer.close()?;
    Ok(())
}

#[test]
fn output_creates_parent_directories() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("deeply/nested/dirs/out.txt");
    let mut sink = open_output(&path)?;
    sink.write_all(b"hello\n")?;
    sink.flush()?;
    drop(sink);
    assert_eq!(fs::read(&path)?, b"hello\n");
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_extension_round_trips_transparently() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("records.txt.gz");

    let mut writer = DelimWriter::create(&path, b'\n')?;
    for i in 0..500u32 {
        writer.write(format!("record-{i}").into_bytes())?;
    }
    writer.close()?;
    drop(writer);

    // The on-disk bytes must actually be gzip, not plain text.
    let raw = fs::read(&path)?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let mut reader = DelimReader::open(&path, b'\n')?;
    let mut count = 0;
    while let Some(record) = reader.read()? {
        assert!(record.starts_with(b"record-"));
        count += 1;
    }
    assert_eq!(count, 500);
    Ok(())
}

#[test]
fn remove_tree_handles_missing_and_populated_roots() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("tree");
    fs::create_dir_all(dir.join("a/b"))?;
    fs::write(dir.join("a/b/file.txt"), b"x")?;

    remove_tree(&dir)?;
    assert!(!dir.exists());
    // A second call on the now-missing root is fine.
    remove_tree(&dir)?;
    Ok(())
}
