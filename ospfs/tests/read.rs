mod common;

use common::*;
use ospfs::BLOCK_SIZE;
use vfs::Error;

#[test]
fn read_at_or_past_eof() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    file.write(b"hello", &mut 0).unwrap();

    let mut buf = [0u8; 8];
    let mut pos = 5;
    assert_eq!(file.read(&mut buf[..], 8, &mut pos), Ok(0));
    assert_eq!(pos, 5);

    let mut pos = 100;
    assert_eq!(file.read(&mut buf[..], 8, &mut pos), Ok(0));
    assert_eq!(pos, 100);
}

#[test]
fn read_is_clamped_to_file_size() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    let data = pattern(1050);
    file.write(&data, &mut 0).unwrap();

    let mut buf = [0u8; 100];
    let mut pos = 1000;
    assert_eq!(file.read(&mut buf[..], 100, &mut pos), Ok(50));
    assert_eq!(pos, 1050);
    assert_eq!(&buf[..50], &data[1000..]);
}

#[test]
fn read_crosses_block_boundaries() {
    let (_fs, root) = mkfs(256, 16);
    let file = root.create("f", 0o644).unwrap();
    // 跨过直接索引进入一级索引
    let data = pattern(12 * BLOCK_SIZE + 17);
    assert_eq!(file.write(&data, &mut 0), Ok(data.len()));

    let mut pos = 3 * BLOCK_SIZE as u64 - 5;
    let mut buf = vec![0u8; 9 * BLOCK_SIZE];
    let count = buf.len();
    assert_eq!(file.read(&mut buf[..], count, &mut pos), Ok(count));
    assert_eq!(pos, (12 * BLOCK_SIZE - 5) as u64);
    assert_eq!(buf, &data[3 * BLOCK_SIZE - 5..12 * BLOCK_SIZE - 5]);

    assert_eq!(file.read_all().unwrap(), data);
}

#[test]
fn read_into_segments() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    let data = pattern(1500);
    file.write(&data, &mut 0).unwrap();

    let mut a = [0u8; 1000];
    let mut b = [0u8; 400];
    let mut segments: [&mut [u8]; 2] = [&mut a, &mut b];
    let mut pos = 50;
    assert_eq!(file.read(&mut segments[..], 1400, &mut pos), Ok(1400));
    assert_eq!(&a[..], &data[50..1050]);
    assert_eq!(&b[..], &data[1050..1450]);
}

#[test]
fn position_overflow_is_rejected() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    file.write(b"abc", &mut 0).unwrap();

    let mut buf = [0u8; 16];
    let mut pos = u64::MAX - 4;
    assert_eq!(file.read(&mut buf[..], 16, &mut pos), Err(Error::Io));
    assert_eq!(pos, u64::MAX - 4);
}

#[test]
fn fault_fails_the_whole_read() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    file.write(&pattern(3000), &mut 0).unwrap();

    let mut buf = FaultyBuf {
        data: Vec::new(),
        limit: 1500,
    };
    let mut pos = 0;
    assert_eq!(file.read(&mut buf, 3000, &mut pos), Err(Error::Fault));

    // 目标缓冲区比请求的短也是一样
    let mut short = [0u8; 10];
    assert_eq!(file.read(&mut short[..], 20, &mut 0), Err(Error::Fault));
}

#[test]
fn unresolvable_block_returns_partial_read() {
    let (fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();
    let data = pattern(2 * BLOCK_SIZE);
    file.write(&data, &mut 0).unwrap();

    // 声称的大小超出了已映射的块
    fs.lock()
        .inode_mut(file.ino(), |disk_inode| disk_inode.size = 5 * BLOCK_SIZE as u32)
        .unwrap();

    let mut buf = vec![0u8; 4 * BLOCK_SIZE];
    let mut pos = 0;
    assert_eq!(file.read(&mut buf[..], 4 * BLOCK_SIZE, &mut pos), Ok(2 * BLOCK_SIZE));
    assert_eq!(pos, 2 * BLOCK_SIZE as u64);
    assert_eq!(&buf[..2 * BLOCK_SIZE], &data[..]);

    assert_eq!(file.read(&mut buf[..], 10, &mut pos), Err(Error::Io));
    assert_eq!(pos, 2 * BLOCK_SIZE as u64);
}

#[test]
fn write_grows_and_overwrites() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("f", 0o644).unwrap();

    let mut pos = 0;
    assert_eq!(file.write(b"0123456789", &mut pos), Ok(10));
    assert_eq!(pos, 10);
    let mut pos = 4;
    assert_eq!(file.write(b"xy", &mut pos), Ok(2));
    let mut pos = 2000;
    assert_eq!(file.write(b"tail", &mut pos), Ok(4));

    let stat = file.stat().unwrap();
    assert_eq!(stat.size, 2004);
    assert_eq!(stat.blocks, 2);

    let bytes = file.read_all().unwrap();
    assert_eq!(&bytes[..10], b"0123xy6789");
    // 中间的空洞读出为零
    assert!(bytes[10..2000].iter().all(|&b| b == 0));
    assert_eq!(&bytes[2000..], b"tail");
}

#[test]
fn write_to_directory_is_rejected() {
    let (_fs, root) = mkfs(128, 16);
    assert_eq!(root.write(b"x", &mut 0), Err(Error::IsADirectory));
}
