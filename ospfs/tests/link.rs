mod common;

use common::*;
use ospfs::{BLOCK_SIZE, NAME_MAX_LEN};
use vfs::Error;

#[test]
fn link_shares_the_inode() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("orig", 0o644).unwrap();
    file.write(b"shared", &mut 0).unwrap();

    root.link(&file, "alias").unwrap();
    assert_eq!(file.stat().unwrap().links, 2);

    let alias = root.find("alias").unwrap();
    assert_eq!(alias.ino(), file.ino());
    assert_eq!(alias.read_all().unwrap(), b"shared");

    // 删掉一个名字，另一个仍然可用
    root.unlink("orig").unwrap();
    assert_eq!(alias.stat().unwrap().links, 1);
    assert_eq!(alias.read_all().unwrap(), b"shared");
}

#[test]
fn link_rejects_existing_and_long_names() {
    let (fs, root) = mkfs(128, 16);
    let file = root.create("a", 0o644).unwrap();
    root.create("b", 0o644).unwrap();
    let before = root.read_dir().unwrap();

    assert_eq!(root.link(&file, "b"), Err(Error::AlreadyExists));
    assert_eq!(
        root.link(&file, &"x".repeat(NAME_MAX_LEN + 1)),
        Err(Error::NameTooLong)
    );
    assert_eq!(root.read_dir().unwrap(), before);
    assert_eq!(file.stat().unwrap().links, 1);
    assert_eq!(fs.lock().find_free_inode(), Some(4));
}

#[test]
fn link_into_regular_file_is_io_error() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("a", 0o644).unwrap();
    assert_eq!(file.link(&file, "b"), Err(Error::Io));
}

#[test]
fn link_count_overflow_is_io_error() {
    let (fs, root) = mkfs(128, 16);
    let file = root.create("a", 0o644).unwrap();
    fs.lock()
        .inode_mut(file.ino(), |disk_inode| disk_inode.links = u32::MAX)
        .unwrap();

    assert_eq!(root.link(&file, "b"), Err(Error::Io));
    assert_eq!(root.find("b").err(), Some(Error::NotFound));
    assert_eq!(file.stat().unwrap().links, u32::MAX);
}

#[test]
fn link_reuses_freed_slot() {
    let (_fs, root) = mkfs(128, 16);
    let a = root.create("a", 0o644).unwrap();
    root.create("b", 0o644).unwrap();
    root.unlink("b").unwrap();

    root.link(&a, "c").unwrap();
    assert_eq!(root.stat().unwrap().size, BLOCK_SIZE as u64);
    let names: Vec<_> = root.read_dir().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["a", "c"]);
}

#[test]
fn link_across_filesystems_is_io_error() {
    let (_fs1, root1) = mkfs(128, 16);
    let (_fs2, root2) = mkfs(128, 16);
    let file = root1.create("a", 0o644).unwrap();
    assert_eq!(root2.link(&file, "a"), Err(Error::Io));
}

#[test]
fn link_rejects_unstorable_names() {
    let (_fs, root) = mkfs(128, 16);
    let file = root.create("a", 0o644).unwrap();

    assert_eq!(root.link(&file, "a\0b"), Err(Error::Io));
    assert_eq!(root.link(&file, ""), Err(Error::Io));

    let names: Vec<_> = root.read_dir().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["a"]);
    assert_eq!(file.stat().unwrap().links, 1);
}

#[test]
fn link_to_freed_inode_is_io_error() {
    let (fs, root) = mkfs(128, 16);
    let file = root.create("a", 0o644).unwrap();
    root.unlink("a").unwrap();

    assert_eq!(root.link(&file, "b"), Err(Error::Io));
    assert_eq!(root.find("b").err(), Some(Error::NotFound));
    assert_eq!(fs.lock().inode(file.ino(), |disk_inode| disk_inode.links), Ok(0));
}

#[test]
fn link_on_full_disk_leaves_directory_untouched() {
    let (_fs, root) = mkfs(64, 16);
    let file = root.create("a", 0o644).unwrap();
    let big = root.create("big", 0o644).unwrap();

    let chunk = pattern(BLOCK_SIZE);
    let mut pos = 0;
    while big.write(&chunk, &mut pos).is_ok() {}

    // 填满根目录的第一个块
    for i in 0..6 {
        root.create(&format!("f{i}"), 0o644).unwrap();
    }
    assert_eq!(root.stat().unwrap().size, BLOCK_SIZE as u64);

    assert_eq!(root.link(&file, "x"), Err(Error::NoSpace));
    assert_eq!(file.stat().unwrap().links, 1);
    assert_eq!(root.stat().unwrap().size, BLOCK_SIZE as u64);
    assert_eq!(root.find("x").err(), Some(Error::NotFound));
}
