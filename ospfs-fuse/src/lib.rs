
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use block_dev::BlockDevice;
use ospfs::{BLOCK_SIZE, Inode};

/// An image file used as a block device.
pub struct BlockFile(pub Mutex<File>);

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        file.read_exact(buf).expect("not a complete block!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        file.write_all(buf).expect("not a complete block!");
    }
}

#[inline]
pub fn fs_error(err: vfs::Error) -> io::Error {
    io::Error::other(err.to_string())
}

/// Copies every regular file directly under `source` into `dir`,
/// returning the packed names in order.
pub fn pack_dir(source: &Path, dir: &Inode, mode: u32) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => log::warn!("skipping non UTF-8 name {name:?}"),
        }
    }
    names.sort();

    for name in &names {
        let data = fs::read(source.join(name))?;
        let inode = dir.create(name, mode).map_err(fs_error)?;
        inode.write(&data, &mut 0).map_err(fs_error)?;
        log::info!("packed {name:?} ({} bytes) as inode {}", data.len(), inode.ino());
    }

    Ok(names)
}

/// `ls -l` style lines for every entry of `dir`.
pub fn listing(dir: &Inode) -> io::Result<Vec<String>> {
    dir.read_dir()
        .map_err(fs_error)?
        .into_iter()
        .map(|entry| -> io::Result<String> {
            let stat = dir.find(&entry.name).and_then(|inode| inode.stat());
            let stat = stat.map_err(fs_error)?;
            Ok(format!(
                "{}{} {:>3} {:>9} {}",
                entry.ty.symbol(),
                String::from_utf8_lossy(&stat.permission_string()),
                stat.links,
                stat.size,
                entry.name
            ))
        })
        .collect()
}
