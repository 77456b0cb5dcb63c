#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* ospfs 的整体架构，自上而下 */

// 索引节点层：实现读取、创建、硬链接等操作
mod vfs;

// 磁盘块管理器层
mod fs;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;

// 块缓存层：内存上的磁盘块数据缓存
mod block_cache;

// 目标缓冲区：模拟向用户空间复制数据
mod user_buf;

pub use self::{
    fs::{DirSlot, OspFileSystem},
    layout::{DirEntry, DiskInode, DiskInodeKind, NAME_MAX_LEN},
    user_buf::CopyToUser,
    vfs::Inode,
};

pub const MAGIC: u32 = 0x013101AE;
pub const BLOCK_SIZE: usize = 1024;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 根目录的 inode 编号；0 号保留不用
pub const ROOT_INO: u32 = 1;

type DataBlock = [u8; BLOCK_SIZE];
