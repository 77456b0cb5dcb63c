mod common;

use std::sync::Arc;

use block_dev::BlockDevice;
use common::*;
use ospfs::{BLOCK_SIZE, OspFileSystem};
use vfs::Error;

#[test]
fn reopen_keeps_files() {
    let disk = MemDisk::new(128);
    {
        let fs = OspFileSystem::format(disk.clone(), 128, 16).unwrap();
        let root = OspFileSystem::root_inode(&fs);
        let file = root.create("kept", 0o600).unwrap();
        file.write(b"persistent", &mut 0).unwrap();
    }

    let fs = OspFileSystem::open(disk).unwrap();
    assert_eq!(fs.lock().nblocks(), 128);
    assert_eq!(fs.lock().ninodes(), 16);

    let root = OspFileSystem::root_inode(&fs);
    let file = root.find("kept").unwrap();
    assert_eq!(file.read_all().unwrap(), b"persistent");
    assert_eq!(file.stat().unwrap().mode, 0o600);
}

#[test]
fn open_rejects_unformatted_disk() {
    let disk = MemDisk::new(32);
    assert_eq!(OspFileSystem::open(disk).err(), Some(Error::Io));
}

#[test]
fn open_rejects_bad_geometry() {
    let disk = MemDisk::new(32);
    OspFileSystem::format(disk.clone(), 32, 16).unwrap();

    // 把 inode 表起始块改掉
    let mut block = [0u8; BLOCK_SIZE];
    disk.read_block(1, &mut block);
    block[12..16].copy_from_slice(&9u32.to_ne_bytes());
    disk.write_block(1, &block);

    let disk: Arc<dyn BlockDevice> = disk;
    assert_eq!(OspFileSystem::open(disk).err(), Some(Error::Io));
}

#[test]
fn format_rejects_tiny_disk() {
    assert_eq!(
        OspFileSystem::format(MemDisk::new(4), 4, 64).err(),
        Some(Error::Io)
    );
    assert_eq!(
        OspFileSystem::format(MemDisk::new(32), 32, 1).err(),
        Some(Error::Io)
    );
}
