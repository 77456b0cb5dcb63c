//! # 索引节点层
//!
//! 宿主 VFS 调用的入口：通过多个 [`Inode`] 形成文件树。
//!
//! [`Inode`] 只记录 inode 编号，每个操作在整个过程中持有文件系统的锁，
//! 先做完全部检查再修改磁盘结构。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;
use vfs::{DirEntryType, Error, Result, Stat};

use crate::fs::{DirSlot, OspFileSystem};
use crate::layout::{DirEntry, DiskInode, DiskInodeKind, MAX_FILE_SIZE, NAME_MAX_LEN};
use crate::user_buf::CopyToUser;
use crate::{BLOCK_SIZE, DataBlock};

#[derive(Clone)]
pub struct Inode {
    /// inode 编号
    ino: u32,
    fs: Arc<Mutex<OspFileSystem>>,
}

impl Inode {
    #[inline]
    pub fn new(ino: u32, fs: Arc<Mutex<OspFileSystem>>) -> Self {
        Self { ino, fs }
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 文件
    ///
    /// 从 `*pos` 处读出至多 `count` 字节交给 `buf`，并把 `*pos` 推进实际读出的字节数。
    /// 返回 0 表示已到文件末尾。
    ///
    /// 中途遇到无法解析的块时，已读出的部分照常返回；
    /// 一个字节都没读出才报告 [`Error::Io`]。
    /// 复制到 `buf` 失败则整个读取报告 [`Error::Fault`]。
    pub fn read<B>(&self, buf: &mut B, count: usize, pos: &mut u64) -> Result<usize>
    where
        B: CopyToUser + ?Sized,
    {
        let fs = self.fs.lock();
        let disk_inode = fs.load_inode(self.ino)?;

        let Some(end) = pos.checked_add(count as u64) else {
            return Err(Error::Io);
        };
        if disk_inode.kind()? == DiskInodeKind::SymLink {
            return Err(Error::Io);
        }

        // 不能越过文件末尾
        let size = disk_inode.size as u64;
        let count = if *pos >= size {
            0
        } else {
            (end.min(size) - *pos) as usize
        };

        let mut amount = 0;
        while amount < count {
            let block_index = (*pos / BLOCK_SIZE as u64) as usize;
            let Some(block_id) = fs.data_block(&disk_inode, block_index) else {
                log::error!("inode {} has no block {block_index}", self.ino);
                return if amount > 0 { Ok(amount) } else { Err(Error::Io) };
            };

            let block_offset = (*pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - block_offset).min(count - amount);
            let uncopied = fs
                .cache
                .get(block_id as usize)
                .lock()
                .map(0, |data_block: &DataBlock| {
                    buf.copy_to_user(amount, &data_block[block_offset..block_offset + n])
                });
            if uncopied > 0 {
                return Err(Error::Fault);
            }

            amount += n;
            *pos += n as u64;
        }

        Ok(amount)
    }

    /// 文件
    ///
    /// 读出整个文件
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let size = self.fs.lock().inode(self.ino, |disk_inode| disk_inode.size)? as usize;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| Error::OutOfMemory)?;
        bytes.resize(size, 0);

        let read = self.read(bytes.as_mut_slice(), size, &mut 0)?;
        bytes.truncate(read);
        Ok(bytes)
    }

    /// 文件
    ///
    /// 在 `*pos` 处写入 `buf`，必要时扩大文件。
    pub fn write(&self, buf: &[u8], pos: &mut u64) -> Result<usize> {
        let mut fs = self.fs.lock();
        let mut disk_inode = fs.load_inode(self.ino)?;

        match disk_inode.kind()? {
            DiskInodeKind::File => {}
            DiskInodeKind::Directory => return Err(Error::IsADirectory),
            DiskInodeKind::SymLink => return Err(Error::Io),
        }

        if buf.is_empty() {
            return Ok(0);
        }
        let Some(end) = pos.checked_add(buf.len() as u64) else {
            return Err(Error::Io);
        };
        if end > MAX_FILE_SIZE as u64 {
            return Err(Error::NoSpace);
        }

        if end > disk_inode.size as u64 {
            fs.grow(&mut disk_inode, end as u32)?;
            fs.store_inode(self.ino, &disk_inode)?;
        }

        let written = disk_inode.write_at(*pos as usize, buf, &fs.cache)?;
        *pos += written as u64;
        fs.sync_all();

        Ok(written)
    }

    /// 目录
    ///
    /// 在当前目录下创建空的普通文件。
    pub fn create(&self, name: &str, mode: u32) -> Result<Inode> {
        let mut fs = self.fs.lock();
        let name = name.as_bytes();
        let dir_inode = fs.load_inode(self.ino)?;

        if !dir_inode.is_dir() {
            return Err(Error::Io);
        }
        check_name(name)?;
        // 确认没有已创建的同名项
        if fs.find_dir_entry(&dir_inode, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let (new_ino, previous) = fs.alloc_inode(DiskInodeKind::File, mode)?;
        let linked = fs
            .alloc_dir_entry(self.ino)
            .and_then(|slot| fs.write_dir_entry(slot, &DirEntry::new(name, new_ino)));
        if let Err(e) = linked {
            // 没有目录项指向它，恢复 inode 原先的记录
            fs.store_inode(new_ino, &previous)?;
            return Err(e);
        }
        fs.sync_all();
        log::debug!("created inode {new_ino} in directory {}", self.ino);

        Ok(Self::new(new_ino, self.fs.clone()))
    }

    /// 目录
    ///
    /// 在当前目录下创建指向 `source` 的硬链接 `name`，不分配新的 inode。
    pub fn link(&self, source: &Inode, name: &str) -> Result<()> {
        if !Arc::ptr_eq(&self.fs, &source.fs) {
            return Err(Error::Io);
        }

        let mut fs = self.fs.lock();
        let name = name.as_bytes();
        let dir_inode = fs.load_inode(self.ino)?;

        if !dir_inode.is_dir() {
            return Err(Error::Io);
        }
        // 已释放的 inode 不能借旧句柄复活
        let links = fs.inode(source.ino, |disk_inode| disk_inode.links)?;
        if links == 0 {
            log::error!("linking freed inode {}", source.ino);
            return Err(Error::Io);
        }
        if links.checked_add(1).is_none() {
            return Err(Error::Io);
        }
        check_name(name)?;
        if fs.find_dir_entry(&dir_inode, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let slot = fs.alloc_dir_entry(self.ino)?;
        fs.write_dir_entry(slot, &DirEntry::new(name, source.ino))?;
        fs.inode_mut(source.ino, |disk_inode| disk_inode.links += 1)?;
        fs.sync_all();

        Ok(())
    }

    /// 目录
    ///
    /// 根据文件名获取 inode
    pub fn find(&self, name: &str) -> Result<Inode> {
        let fs = self.fs.lock();
        let dir_inode = fs.load_inode(self.ino)?;
        if !dir_inode.is_dir() {
            return Err(Error::Io);
        }

        fs.find_dir_entry(&dir_inode, name.as_bytes())?
            .map(|(_, ino)| Self::new(ino, self.fs.clone()))
            .ok_or(Error::NotFound)
    }

    /// 目录
    ///
    /// 删除目录项；inode 的链接数归零时归还它的数据块。
    pub fn unlink(&self, name: &str) -> Result<()> {
        let mut fs = self.fs.lock();
        let dir_inode = fs.load_inode(self.ino)?;
        if !dir_inode.is_dir() {
            return Err(Error::Io);
        }

        let (offset, ino) = fs
            .find_dir_entry(&dir_inode, name.as_bytes())?
            .ok_or(Error::NotFound)?;
        let mut target = fs.load_inode(ino)?;
        if target.is_dir() {
            return Err(Error::IsADirectory);
        }
        if target.is_free() {
            log::error!("directory {} names free inode {ino}", self.ino);
            return Err(Error::Io);
        }

        fs.write_dir_entry(
            DirSlot {
                dir: self.ino,
                offset,
            },
            &DirEntry::default(),
        )?;

        target.links -= 1;
        if target.is_free() {
            fs.release(&mut target)?;
            log::debug!("inode {ino} freed");
        }
        fs.store_inode(ino, &target)?;
        fs.sync_all();

        Ok(())
    }

    /// 目录
    ///
    /// 列出全部有效目录项
    pub fn read_dir(&self) -> Result<Vec<vfs::DirEntry>> {
        let fs = self.fs.lock();
        let dir_inode = fs.load_inode(self.ino)?;
        if !dir_inode.is_dir() {
            return Err(Error::Io);
        }

        fs.live_dir_entries(&dir_inode)?
            .into_iter()
            .map(|dir_entry| -> Result<vfs::DirEntry> {
                let kind = fs.inode(dir_entry.inode_id(), DiskInode::kind)??;
                Ok(vfs::DirEntry {
                    inode: dir_entry.inode_id() as u64,
                    ty: kind.into(),
                    name: String::from_utf8_lossy(dir_entry.name()).into_owned(),
                })
            })
            .collect()
    }

    pub fn stat(&self) -> Result<Stat> {
        let fs = self.fs.lock();
        let disk_inode = fs.load_inode(self.ino)?;

        Ok(Stat {
            inode: self.ino as u64,
            kind: disk_inode.kind()?.into(),
            mode: disk_inode.mode,
            links: disk_inode.links,
            size: disk_inode.size as u64,
            block_size: BLOCK_SIZE as u64,
            blocks: DiskInode::count_data_block(disk_inode.size) as u64,
        })
    }
}

/// 目录项的名字止于第一个 \0，空名与含 \0 的名字都无法原样存下
fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name.contains(&0) {
        return Err(Error::Io);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(Error::NameTooLong);
    }

    Ok(())
}

impl From<DiskInodeKind> for DirEntryType {
    #[inline]
    fn from(kind: DiskInodeKind) -> Self {
        match kind {
            DiskInodeKind::Directory => Self::Directory,
            DiskInodeKind::File => Self::Regular,
            DiskInodeKind::SymLink => Self::SymLink,
        }
    }
}
