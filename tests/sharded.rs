mod common;

use anyhow::Result;
use common::{FailOnCloseWriter, SharedVecWriter};
use shardpipe::{BoxWriter, RecordWriter, ShardRouter, ShardedFile, ShardedWriter};
use std::path::PathBuf;

#[test]
fn shard_paths_are_zero_padded_before_the_extension() -> Result<()> {
    let sharded = ShardedFile::new("dir/data.txt", 4)?;
    let expected: Vec<PathBuf> = ["dir/data0.txt", "dir/data1.txt", "dir/data2.txt", "dir/data3.txt"]
        .iter()
        .map(PathBuf::from)
        .collect();
    assert_eq!(sharded.paths(), expected.as_slice());
    Ok(())
}

#[test]
fn padding_width_follows_the_largest_index() -> Result<()> {
    let sharded = ShardedFile::new("data.log", 16)?;
    let paths = sharded.paths();
    assert_eq!(paths[0], PathBuf::from("data00.log"));
    assert_eq!(paths[9], PathBuf::from("data09.log"));
    assert_eq!(paths[15], PathBuf::from("data15.log"));

    let ten = ShardedFile::new("data.log", 10)?;
    // Largest index is 9, so a single digit suffices.
    assert_eq!(ten.paths()[9], PathBuf::from("data9.log"));
    Ok(())
}

#[test]
fn extensionless_templates_append_the_index() -> Result<()> {
    let sharded = ShardedFile::new("dir/part", 3)?;
    assert_eq!(sharded.paths()[2], PathBuf::from("dir/part2"));
    Ok(())
}

#[test]
fn single_shard_still_carries_an_index() -> Result<()> {
    let sharded = ShardedFile::new("out.txt", 1)?;
    assert_eq!(sharded.paths().len(), 1);
    assert_eq!(sharded.paths()[0], PathBuf::from("out0.txt"));
    Ok(())
}

#[test]
fn zero_shards_is_rejected() {
    assert!(ShardedFile::new("out.txt", 0).is_err());
}

#[test]
fn paths_are_cached() -> Result<()> {
    let sharded = ShardedFile::new("a/b.c", 5)?;
    let first = sharded.paths().as_ptr();
    let second = sharded.paths().as_ptr();
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn writer_routes_each_record_to_exactly_one_shard() -> Result<()> {
    let router = ShardRouter::for_shards(4)?;
    let mut handles = Vec::new();
    let mut writers: Vec<BoxWriter<u32>> = Vec::new();
    for _ in 0..4 {
        let (writer, items) = SharedVecWriter::new();
        writers.push(Box::new(writer));
        handles.push(items);
    }
    let mut sharded = ShardedWriter::new(writers, router)?;

    for i in 0..1000u32 {
        sharded.write(i)?;
    }
    sharded.close()?;

    let mut total = 0;
    for (index, handle) in handles.iter().enumerate() {
        let items = handle.lock().unwrap();
        for record in items.iter() {
            assert_eq!(router.route(record) as usize, index);
        }
        total += items.len();
    }
    assert_eq!(total, 1000);
    Ok(())
}

#[test]
fn writer_count_must_match_router_index_space() -> Result<()> {
    let (writer, _items) = SharedVecWriter::<u32>::new();
    let writers: Vec<BoxWriter<u32>> = vec![Box::new(writer)];
    assert!(ShardedWriter::new(writers, ShardRouter::for_shards(4)?).is_err());
    Ok(())
}

#[test]
fn close_reaches_every_writer_despite_failures() -> Result<()> {
    let (tail, tail_items) = SharedVecWriter::<u32>::new();
    let writers: Vec<BoxWriter<u32>> = vec![
        Box::new(FailOnCloseWriter::new()),
        Box::new(tail),
    ];
    let mut sharded = ShardedWriter::new(writers, ShardRouter::for_shards(2)?)?;

    sharded.write(0)?;
    sharded.write(1)?;
    let err = sharded.close().unwrap_err();
    assert!(err.to_string().contains("simulated close failure"));
    // The second writer was still closed and keeps its record.
    assert_eq!(tail_items.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn empty_stream_round_trips() -> Result<()> {
    let (writer, items) = SharedVecWriter::<u32>::new();
    let writers: Vec<BoxWriter<u32>> = vec![Box::new(writer)];
    let mut sharded = ShardedWriter::new(writers, ShardRouter::for_shards(1)?)?;
    sharded.close()?;
    assert!(items.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn delete_removes_shards_and_parent_directory() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("shards");
    let sharded = ShardedFile::new(dir.join("data.txt"), 3)?;
    for path in sharded.paths() {
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, b"x\n")?;
    }
    assert!(dir.exists());

    sharded.delete()?;
    assert!(!dir.exists());
    Ok(())
}
