#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use ospfs::{BLOCK_SIZE, CopyToUser, Inode, OspFileSystem};

/// 内存中的块设备
pub struct MemDisk(Mutex<Vec<[u8; BLOCK_SIZE]>>);

impl MemDisk {
    pub fn new(nblocks: u32) -> Arc<Self> {
        Arc::new(Self(Mutex::new(vec![[0xa5; BLOCK_SIZE]; nblocks as usize])))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.0.lock().unwrap()[block_id]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        self.0.lock().unwrap()[block_id].copy_from_slice(buf);
    }
}

pub type Fs = Arc<spin::Mutex<OspFileSystem>>;

pub fn mkfs(nblocks: u32, ninodes: u32) -> (Fs, Inode) {
    let fs = OspFileSystem::format(MemDisk::new(nblocks), nblocks, ninodes).unwrap();
    let root = OspFileSystem::root_inode(&fs);
    (fs, root)
}

/// 写入 `len` 字节的可预测内容
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// 超过 `limit` 字节就无法写入的缓冲区
pub struct FaultyBuf {
    pub data: Vec<u8>,
    pub limit: usize,
}

impl CopyToUser for FaultyBuf {
    fn copy_to_user(&mut self, offset: usize, src: &[u8]) -> usize {
        let end = (offset + src.len()).min(self.limit);
        let n = end.saturating_sub(offset);
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..offset + n].copy_from_slice(&src[..n]);
        src.len() - n
    }
}
