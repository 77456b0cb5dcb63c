//! # 磁盘数据结构层
//!
//! ospfs 的磁盘布局：
//! 引导块 | 超级块 | 空闲块位图 | 索引节点表 | 数据块区域

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, DiskInodeKind, MAX_FILE_SIZE};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX_LEN};
