//! 磁盘上的 inode 及其块映射
//!
//! - 直接索引：`direct` 中的编号直接指向**数据块**
//! - 一级索引：整个块连续存储**块编号**，每个编号都指向一个数据块
//! - 二级索引：整个块连续存储**块编号**，每个编号都指向一个一级索引块
//!
//! 目录的空间用于存放目录项；
//! 文件的空间用于存放它的数据。
//!
//! 块编号 0 表示“没有块”。

use alloc::vec::Vec;

use vfs::Error;

use crate::block_cache::BlockCacheManager;
use crate::{BLOCK_SIZE, DataBlock};

/// 间接索引块的编号容量
const INDIRECT_COUNT: usize = BLOCK_SIZE / 4;
/// 间接索引块
type IndirectBlock = [u32; INDIRECT_COUNT];

/// 直接索引块可编号数量
const DIRECT_COUNT: usize = 10;
/// 直接索引时的编号容量
const DIRECT_CAP: usize = DIRECT_COUNT;
/// 用上一级索引时的编号容量
const INDIRECT1_CAP: usize = DIRECT_CAP + INDIRECT_COUNT;
/// 用上二级索引时的编号容量
const INDIRECT2_CAP: usize = INDIRECT1_CAP + INDIRECT_COUNT * INDIRECT_COUNT;

/// 单个文件的最大字节数
pub const MAX_FILE_SIZE: usize = INDIRECT2_CAP * BLOCK_SIZE;

#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
pub struct DiskInode {
    // 不用usize是为了严控布局
    pub size: u32,
    /// 类型，见 [`DiskInodeKind`]；磁盘上可能是任意值，因此存原始数
    kind: u32,
    /// 硬链接个数，为 0 表示空闲
    pub links: u32,
    /// 权限位
    pub mode: u32,
    direct: [u32; DIRECT_COUNT],
    /// 指向一个一级索引块
    indirect: u32,
    /// 指向一个二级索引块
    indirect2: u32,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum DiskInodeKind {
    #[default]
    File = 0,
    Directory = 1,
    SymLink = 2,
}

impl DiskInode {
    /// 0 -> 1 的链接数变化：一个新的空 inode
    #[inline]
    pub fn init(&mut self, kind: DiskInodeKind, mode: u32) {
        *self = Self {
            kind: kind as u32,
            links: 1,
            mode,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Result<DiskInodeKind, Error> {
        match self.kind {
            0 => Ok(DiskInodeKind::File),
            1 => Ok(DiskInodeKind::Directory),
            2 => Ok(DiskInodeKind::SymLink),
            raw => {
                log::error!("unknown file type {raw}");
                Err(Error::Io)
            }
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == DiskInodeKind::Directory as u32
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.links == 0
    }

    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的索引（逻辑索引），
    /// 然后返回块缓存层使用的ID。
    ///
    /// 索引超出文件大小、编号为 0 或超出设备时返回空。
    pub fn block_id(&self, block_index: usize, cache: &BlockCacheManager) -> Option<u32> {
        if block_index >= Self::count_data_block(self.size) {
            return None;
        }

        let block_id = if block_index < DIRECT_CAP {
            self.direct[block_index]
        } else if block_index < INDIRECT1_CAP {
            // 剔去直接索引的部分
            indirect_entry(self.indirect, block_index - DIRECT_CAP, cache)?
        } else if block_index < INDIRECT2_CAP {
            // 剔去使用了一级索引的部分
            let index = block_index - INDIRECT1_CAP;
            let indirect1 = indirect_entry(self.indirect2, index / INDIRECT_COUNT, cache)?;
            indirect_entry(indirect1, index % INDIRECT_COUNT, cache)?
        } else {
            return None;
        };

        (block_id != 0 && cache.contains(block_id as usize)).then_some(block_id)
    }

    /// 把新块接入块映射。`new_blocks` 必须恰好是
    /// `count_total_block(larger_size) - count_total_block(self.size)` 个已清零的块，
    /// 按逻辑块的顺序消耗，索引块先于它所指向的数据块。
    pub fn expand_to(
        &mut self,
        larger_size: u32,
        new_blocks: Vec<u32>,
        cache: &BlockCacheManager,
    ) -> Result<(), Error> {
        let mut block_index = Self::count_data_block(self.size);
        let new_total_blocks = Self::count_data_block(larger_size);
        let mut new_blocks = new_blocks.into_iter();
        let mut next = || {
            new_blocks.next().ok_or_else(|| {
                log::error!("block map ran out of new blocks");
                Error::Io
            })
        };

        if new_total_blocks > INDIRECT2_CAP {
            return Err(Error::NoSpace);
        }

        while block_index < new_total_blocks {
            if block_index < DIRECT_CAP {
                self.direct[block_index] = next()?;
            } else if block_index < INDIRECT1_CAP {
                // 这次size的增加经过了DIRECT_CAP，创建一级索引
                if block_index == DIRECT_CAP {
                    self.indirect = next()?;
                }
                let data = next()?;
                set_indirect_entry(self.indirect, block_index - DIRECT_CAP, data, cache);
            } else {
                let index = block_index - INDIRECT1_CAP;
                // 这次size的增加经过了INDIRECT1_CAP，创建二级索引
                if index == 0 {
                    self.indirect2 = next()?;
                }
                // 子块索引为0表示进入新的一级索引块
                if index % INDIRECT_COUNT == 0 {
                    let indirect1 = next()?;
                    set_indirect_entry(self.indirect2, index / INDIRECT_COUNT, indirect1, cache);
                }
                let indirect1 = cache
                    .get(self.indirect2 as usize)
                    .lock()
                    .map(0, |indirect2: &IndirectBlock| indirect2[index / INDIRECT_COUNT]);
                let data = next()?;
                set_indirect_entry(indirect1, index % INDIRECT_COUNT, data, cache);
            }

            block_index += 1;
        }

        self.size = larger_size;
        Ok(())
    }

    /// 清空块映射，返回其占用的全部数据块与索引块
    pub fn clear(&mut self, cache: &BlockCacheManager) -> Vec<u32> {
        let mut data_blocks = Self::count_data_block(self.size);
        let mut drop_blocks: Vec<u32> = Vec::with_capacity(Self::count_total_block(self.size));
        self.size = 0;

        /******************** 直接索引 ********************/
        drop_blocks.extend_from_slice(&self.direct[..data_blocks.min(DIRECT_CAP)]);
        self.direct.fill(0);
        /******************** END ********************/

        if data_blocks <= DIRECT_CAP {
            return drop_blocks;
        }

        /******************** 一级索引 ********************/
        data_blocks -= DIRECT_CAP;
        drop_blocks.push(self.indirect);
        if self.indirect != 0 {
            cache
                .get(self.indirect as usize)
                .lock()
                .map(0, |indirect1: &IndirectBlock| {
                    drop_blocks.extend_from_slice(&indirect1[..data_blocks.min(INDIRECT_COUNT)]);
                });
        }
        self.indirect = 0;
        /******************** END ********************/

        if data_blocks <= INDIRECT_COUNT {
            return drop_blocks;
        }

        /******************** 二级索引 ********************/
        data_blocks -= INDIRECT_COUNT;
        drop_blocks.push(self.indirect2);
        if self.indirect2 != 0 {
            cache
                .get(self.indirect2 as usize)
                .lock()
                .map(0, |indirect2: &IndirectBlock| {
                    let used = data_blocks.div_ceil(INDIRECT_COUNT);
                    for (i, &indirect1) in indirect2.iter().take(used).enumerate() {
                        drop_blocks.push(indirect1);
                        if indirect1 == 0 {
                            continue;
                        }
                        let take = (data_blocks - i * INDIRECT_COUNT).min(INDIRECT_COUNT);
                        cache
                            .get(indirect1 as usize)
                            .lock()
                            .map(0, |indirect1: &IndirectBlock| {
                                drop_blocks.extend_from_slice(&indirect1[..take]);
                            });
                    }
                });
        }
        self.indirect2 = 0;
        /******************** END ********************/

        drop_blocks
    }

    /// 从指定位置(字节偏移)读出数据填充`buf`，不超过文件末尾
    pub fn read_at(
        &self,
        offset: usize,
        buf: &mut [u8],
        cache: &BlockCacheManager,
    ) -> Result<usize, Error> {
        let mut start = offset;
        let end = (start + buf.len()).min(self.size as usize);

        if start >= end {
            return Ok(0);
        }

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            let block_index = start / BLOCK_SIZE;
            // 当前块的末地址(字节)
            let current_block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
            let block_read_size = current_block_end - start;
            let dest = &mut buf[read_size..read_size + block_read_size];
            let block_id = self.block_id(block_index, cache).ok_or(Error::Io)?;

            cache
                .get(block_id as usize)
                .lock()
                .map(0, |data_block: &DataBlock| {
                    // 绝对地址 % 块大小 = 块内偏移
                    let src = &data_block[start % BLOCK_SIZE..start % BLOCK_SIZE + block_read_size];
                    dest.copy_from_slice(src);
                });

            read_size += block_read_size;

            if current_block_end == end {
                break;
            }

            start = current_block_end;
        }

        Ok(read_size)
    }

    /// 向指定位置写入`buf`，不超过文件末尾；扩容由调用者事先完成
    pub fn write_at(
        &self,
        offset: usize,
        buf: &[u8],
        cache: &BlockCacheManager,
    ) -> Result<usize, Error> {
        let mut start = offset;
        let end = (start + buf.len()).min(self.size as usize);

        if start >= end {
            return Ok(0);
        }

        let mut written_size = 0;
        loop {
            let block_index = start / BLOCK_SIZE;
            let current_block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
            let block_write_size = current_block_end - start;
            let block_id = self.block_id(block_index, cache).ok_or(Error::Io)?;

            cache
                .get(block_id as usize)
                .lock()
                .map_mut(0, |data_block: &mut DataBlock| {
                    let src = &buf[written_size..written_size + block_write_size];
                    let dest =
                        &mut data_block[start % BLOCK_SIZE..start % BLOCK_SIZE + block_write_size];
                    dest.copy_from_slice(src);
                });

            written_size += block_write_size;

            if current_block_end == end {
                break;
            }

            start = current_block_end;
        }

        Ok(written_size)
    }

    /// 计算容纳指定数据量需要多少个**数据块**
    #[inline]
    pub fn count_data_block(size: u32) -> usize {
        (size as usize).div_ceil(BLOCK_SIZE)
    }

    /// 计算容纳指定数据量需要多少个 **数据块** 和 **索引块**(`IndirectBlock`)
    pub fn count_total_block(size: u32) -> usize {
        let data_blocks = Self::count_data_block(size);
        let mut total = data_blocks;

        // 超出直接索引，使用一级索引块
        if data_blocks > DIRECT_CAP {
            total += 1;
        }

        // 超出一级索引，使用二级索引块及其下的一级索引块
        if data_blocks > INDIRECT1_CAP {
            total += 1 + (data_blocks - INDIRECT1_CAP).div_ceil(INDIRECT_COUNT);
        }

        total
    }
}

/// 读出索引块中的一项，索引块本身为 0 时返回空
fn indirect_entry(block_id: u32, index: usize, cache: &BlockCacheManager) -> Option<u32> {
    if block_id == 0 || !cache.contains(block_id as usize) {
        return None;
    }
    let entry = cache
        .get(block_id as usize)
        .lock()
        .map(0, |indirect: &IndirectBlock| indirect[index]);
    (entry != 0).then_some(entry)
}

#[inline]
fn set_indirect_entry(block_id: u32, index: usize, value: u32, cache: &BlockCacheManager) {
    cache
        .get(block_id as usize)
        .lock()
        .map_mut(0, |indirect: &mut IndirectBlock| indirect[index] = value);
}
