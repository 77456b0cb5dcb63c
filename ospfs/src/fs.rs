//! # 磁盘块管理器层
//!
//! 构建出磁盘的布局并使用：inode 表的访问、空闲 inode 的扫描、
//! 数据块的分配与回收，以及目录项槽位的分配。
//!
//! 这里的所有扫描都不缓存结果，每次调用重新遍历磁盘结构。
//! 扫描与随后的占用之间不能插入其它操作，
//! 因此挂载后的文件系统总是放在 [`Mutex`] 里使用。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;
use vfs::Error;

use crate::Inode;
use crate::block_cache::{BlockCache, BlockCacheManager};
use crate::layout::*;
use crate::{BLOCK_SIZE, DataBlock, ROOT_INO};

const INODE_SIZE: usize = mem::size_of::<DiskInode>();
const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

const SUPER_BLOCK_ID: u32 = 1;
const BITMAP_START_BLOCK: u32 = 2;

/// 根目录的默认权限
const ROOT_MODE: u32 = 0o755;

pub struct OspFileSystem {
    pub(crate) cache: BlockCacheManager,
    bitmap: Bitmap,
    nblocks: u32,
    ninodes: u32,
    firstinob: u32,
}

/// 目录项槽位：所在目录的 inode 编号以及目录数据内的字节偏移。
///
/// 只在一次操作的持锁期间有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirSlot {
    pub dir: u32,
    pub offset: usize,
}

impl OspFileSystem {
    /// 在块设备上创建空的文件系统，只含根目录
    pub fn format(
        block_device: Arc<dyn BlockDevice>,
        nblocks: u32,
        ninodes: u32,
    ) -> Result<Arc<Mutex<Self>>, Error> {
        let bitmap_blocks = Bitmap::blocks_for(nblocks);
        let firstinob = BITMAP_START_BLOCK + bitmap_blocks;
        let inode_blocks = (ninodes as usize * INODE_SIZE).div_ceil(BLOCK_SIZE) as u32;
        let first_data_block = firstinob + inode_blocks;

        if ninodes <= ROOT_INO || first_data_block >= nblocks {
            log::error!("{nblocks} blocks cannot hold {ninodes} inodes");
            return Err(Error::Io);
        }

        let zero = [0u8; BLOCK_SIZE];
        for block_id in 0..nblocks {
            block_device.write_block(block_id as usize, &zero);
        }

        let fs = Self {
            cache: BlockCacheManager::new(block_device, nblocks as usize),
            bitmap: Bitmap::new(BITMAP_START_BLOCK as usize, bitmap_blocks as usize),
            nblocks,
            ninodes,
            firstinob,
        };

        fs.cache
            .get(SUPER_BLOCK_ID as usize)
            .lock()
            .map_mut(0, |super_block: &mut SuperBlock| {
                super_block.init(nblocks, ninodes, firstinob)
            });

        // 引导块、超级块、位图、inode 表以及位图末尾多出的位都不可分配
        for block_id in (0..first_data_block).chain(nblocks..fs.bitmap.capacity() as u32) {
            fs.bitmap.mark(&fs.cache, block_id);
        }

        fs.inode_mut(ROOT_INO, |root| root.init(DiskInodeKind::Directory, ROOT_MODE))?;
        fs.cache.sync_all();
        log::info!(
            "formatted {nblocks} blocks, {ninodes} inodes, data from block {first_data_block}"
        );

        Ok(Arc::new(Mutex::new(fs)))
    }

    /// 打开块设备上已有的文件系统
    pub fn open(block_device: Arc<dyn BlockDevice>) -> Result<Arc<Mutex<Self>>, Error> {
        let super_block = *BlockCache::new(SUPER_BLOCK_ID as usize, block_device.clone())
            .get::<SuperBlock>(0);

        if !super_block.is_valid() {
            log::error!("bad magic number");
            return Err(Error::Io);
        }

        let SuperBlock {
            nblocks,
            ninodes,
            firstinob,
            ..
        } = super_block;
        let bitmap_blocks = Bitmap::blocks_for(nblocks);
        let inode_blocks = (ninodes as usize * INODE_SIZE).div_ceil(BLOCK_SIZE);
        if firstinob != BITMAP_START_BLOCK + bitmap_blocks
            || ninodes <= ROOT_INO
            || firstinob as usize + inode_blocks >= nblocks as usize
        {
            log::error!("inconsistent geometry: {super_block:?}");
            return Err(Error::Io);
        }

        let fs = Self {
            cache: BlockCacheManager::new(block_device, nblocks as usize),
            bitmap: Bitmap::new(BITMAP_START_BLOCK as usize, bitmap_blocks as usize),
            nblocks,
            ninodes,
            firstinob,
        };
        if !fs.inode(ROOT_INO, DiskInode::is_dir)? {
            log::error!("root inode is not a directory");
            return Err(Error::Io);
        }

        Ok(Arc::new(Mutex::new(fs)))
    }

    pub fn root_inode(fs: &Arc<Mutex<Self>>) -> Inode {
        Inode::new(ROOT_INO, fs.clone())
    }

    #[inline]
    pub fn nblocks(&self) -> u32 {
        self.nblocks
    }

    #[inline]
    pub fn ninodes(&self) -> u32 {
        self.ninodes
    }

    pub fn sync_all(&self) {
        self.cache.sync_all();
    }
}

/* inode 表 */
impl OspFileSystem {
    /// 通过编号获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**。
    /// 0 号与越界的编号都是调用者的错误。
    fn disk_inode_pos(&self, inode_id: u32) -> Result<(usize, usize), Error> {
        if inode_id == 0 || inode_id >= self.ninodes {
            log::error!("inode {inode_id} out of range 1..{}", self.ninodes);
            return Err(Error::Io);
        }

        let inode_id = inode_id as usize;
        let block_id = self.firstinob as usize + inode_id / INODES_PER_BLOCK;
        let block_offset = inode_id % INODES_PER_BLOCK * INODE_SIZE;

        Ok((block_id, block_offset))
    }

    /// 读取 inode 的映射并处理
    pub fn inode<V>(&self, inode_id: u32, f: impl FnOnce(&DiskInode) -> V) -> Result<V, Error> {
        let (block_id, block_offset) = self.disk_inode_pos(inode_id)?;
        Ok(self.cache.get(block_id).lock().map(block_offset, f))
    }

    /// 修改 inode 的映射。`f` 内不得访问其它块，以免与持有的块锁冲突。
    pub fn inode_mut<V>(
        &self,
        inode_id: u32,
        f: impl FnOnce(&mut DiskInode) -> V,
    ) -> Result<V, Error> {
        let (block_id, block_offset) = self.disk_inode_pos(inode_id)?;
        Ok(self.cache.get(block_id).lock().map_mut(block_offset, f))
    }

    /// 取出 inode 的副本，便于在不持有 inode 所在块的情况下访问数据块
    #[inline]
    pub(crate) fn load_inode(&self, inode_id: u32) -> Result<DiskInode, Error> {
        self.inode(inode_id, |disk_inode| *disk_inode)
    }

    #[inline]
    pub(crate) fn store_inode(&self, inode_id: u32, disk_inode: &DiskInode) -> Result<(), Error> {
        self.inode_mut(inode_id, |slot| *slot = *disk_inode)
    }

    /// 从 2 号开始寻找链接数为 0 的 inode
    pub fn find_free_inode(&self) -> Option<u32> {
        (ROOT_INO + 1..self.ninodes)
            .find(|&inode_id| matches!(self.inode(inode_id, DiskInode::is_free), Ok(true)))
    }

    /// 找到空闲 inode 并立即初始化，链接数随之变为 1。
    /// 同时返回它原先的记录，失败时用 [`store_inode`](Self::store_inode) 恢复。
    pub(crate) fn alloc_inode(
        &mut self,
        kind: DiskInodeKind,
        mode: u32,
    ) -> Result<(u32, DiskInode), Error> {
        let Some(inode_id) = self.find_free_inode() else {
            log::warn!("inode table is full");
            return Err(Error::NoSpace);
        };
        let previous = self.inode_mut(inode_id, |disk_inode| {
            let previous = *disk_inode;
            disk_inode.init(kind, mode);
            previous
        })?;
        log::debug!("allocated inode {inode_id}");

        Ok((inode_id, previous))
    }
}

/* 数据块 */
impl OspFileSystem {
    /// 分配一个清零的数据块
    fn alloc_block(&mut self) -> Option<u32> {
        let block_id = self.bitmap.alloc(&self.cache)?;
        if !self.cache.contains(block_id as usize) {
            log::error!("bitmap handed out block {block_id} past the end of the disk");
            return None;
        }
        self.cache
            .get(block_id as usize)
            .lock()
            .map_mut(0, |data_block: &mut DataBlock| data_block.fill(0));

        Some(block_id)
    }

    fn dealloc_block(&mut self, block_id: u32) -> Result<(), Error> {
        self.bitmap.dealloc(&self.cache, block_id)
    }

    /// 文件内第 `block_index` 块对应的磁盘块
    #[inline]
    pub(crate) fn data_block(&self, disk_inode: &DiskInode, block_index: usize) -> Option<u32> {
        disk_inode.block_id(block_index, &self.cache)
    }

    /// 把 inode 扩大到 `new_size` 字节。
    ///
    /// 所需的数据块与索引块一次性申请，不够时归还已申请的块并返回
    /// [`Error::NoSpace`]，此时 `disk_inode` 不变。新块全部清零。
    pub(crate) fn grow(&mut self, disk_inode: &mut DiskInode, new_size: u32) -> Result<(), Error> {
        if new_size <= disk_inode.size {
            return Ok(());
        }
        if new_size as usize > MAX_FILE_SIZE {
            return Err(Error::NoSpace);
        }

        let needed = DiskInode::count_total_block(new_size)
            - DiskInode::count_total_block(disk_inode.size);
        let mut new_blocks = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.alloc_block() {
                Some(block_id) => new_blocks.push(block_id),
                None => {
                    log::warn!("disk full: wanted {needed} blocks, got {}", new_blocks.len());
                    for block_id in new_blocks {
                        self.dealloc_block(block_id)?;
                    }
                    return Err(Error::NoSpace);
                }
            }
        }

        disk_inode.expand_to(new_size, new_blocks, &self.cache)
    }

    /// 归还 inode 占用的全部块，大小归零
    pub(crate) fn release(&mut self, disk_inode: &mut DiskInode) -> Result<(), Error> {
        let blocks = disk_inode.clear(&self.cache);
        for block_id in blocks.into_iter().filter(|&block_id| block_id != 0) {
            self.dealloc_block(block_id)?;
        }

        Ok(())
    }
}

/* 目录 */
impl OspFileSystem {
    /// 读出目录中 `offset` 处的目录项
    fn dir_entry_at(&self, dir_inode: &DiskInode, offset: usize) -> Result<DirEntry, Error> {
        let mut dir_entry = DirEntry::default();
        if dir_inode.read_at(offset, dir_entry.as_bytes_mut(), &self.cache)? != DirEntry::SIZE {
            log::error!("truncated directory entry at {offset}");
            return Err(Error::Io);
        }

        Ok(dir_entry)
    }

    /// 遍历目录中的全部目录项（包括空槽位）及其偏移
    fn dir_entries<'a>(
        &'a self,
        dir_inode: &'a DiskInode,
    ) -> impl Iterator<Item = Result<(usize, DirEntry), Error>> + 'a {
        (0..dir_inode.size as usize)
            .step_by(DirEntry::SIZE)
            .map(move |offset| {
                self.dir_entry_at(dir_inode, offset)
                    .map(|dir_entry| (offset, dir_entry))
            })
    }

    /// 在目录中按名字寻找有效目录项，返回其偏移与 inode 编号
    pub(crate) fn find_dir_entry(
        &self,
        dir_inode: &DiskInode,
        name: &[u8],
    ) -> Result<Option<(usize, u32)>, Error> {
        for entry in self.dir_entries(dir_inode) {
            let (offset, dir_entry) = entry?;
            if !dir_entry.is_free() && dir_entry.name() == name {
                return Ok(Some((offset, dir_entry.inode_id())));
            }
        }

        Ok(None)
    }

    /// 目录中全部有效目录项
    pub(crate) fn live_dir_entries(&self, dir_inode: &DiskInode) -> Result<Vec<DirEntry>, Error> {
        self.dir_entries(dir_inode)
            .filter_map(|entry| match entry {
                Ok((_, dir_entry)) if dir_entry.is_free() => None,
                Ok((_, dir_entry)) => Some(Ok(dir_entry)),
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    /// 在目录中寻找空槽位；找不到就给目录增加一个块，返回新块的第一个槽位。
    ///
    /// 扩容失败时目录大小不变。
    pub fn alloc_dir_entry(&mut self, dir: u32) -> Result<DirSlot, Error> {
        let mut dir_inode = self.load_inode(dir)?;
        if !dir_inode.is_dir() {
            log::error!("inode {dir} is not a directory");
            return Err(Error::Io);
        }

        for entry in self.dir_entries(&dir_inode) {
            let (offset, dir_entry) = entry?;
            if dir_entry.is_free() {
                return Ok(DirSlot { dir, offset });
            }
        }

        // 扫描停在目录末尾
        let offset = (dir_inode.size as usize).next_multiple_of(DirEntry::SIZE);
        let new_size = (DiskInode::count_data_block(dir_inode.size) + 1) * BLOCK_SIZE;
        self.grow(&mut dir_inode, new_size as u32)?;
        self.store_inode(dir, &dir_inode)?;
        log::debug!("directory {dir} grew to {new_size} bytes");

        // 新块应当读出全零，即全是空槽位
        if !self.dir_entry_at(&dir_inode, offset)?.is_free() {
            log::error!("directory {dir} grew into a non-empty block");
            return Err(Error::Io);
        }

        Ok(DirSlot { dir, offset })
    }

    /// 写入目录项；目录项的 inode 编号与名字一起落盘
    pub(crate) fn write_dir_entry(&self, slot: DirSlot, dir_entry: &DirEntry) -> Result<(), Error> {
        let dir_inode = self.load_inode(slot.dir)?;
        if dir_inode.write_at(slot.offset, dir_entry.as_bytes(), &self.cache)? != DirEntry::SIZE {
            log::error!("directory {} has no slot at {}", slot.dir, slot.offset);
            return Err(Error::Io);
        }

        Ok(())
    }
}
