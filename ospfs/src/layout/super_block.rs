use crate::MAGIC;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    /// 文件系统占据块数
    pub nblocks: u32,
    /// inode 表容量
    pub ninodes: u32,
    /// inode 表的起始块
    pub firstinob: u32,
}

impl SuperBlock {
    #[inline]
    pub fn init(&mut self, nblocks: u32, ninodes: u32, firstinob: u32) {
        *self = Self {
            magic: MAGIC,
            nblocks,
            ninodes,
            firstinob,
        };
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}
