use alloc::string::String;

/// 目录下的一项，交给宿主的形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: u64,
    pub ty: DirEntryType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    Directory,
    SymLink,
    #[default]
    Regular,
}

impl DirEntryType {
    /// `ls -l` 风格的类型字符
    pub fn symbol(self) -> char {
        match self {
            Self::Directory => 'd',
            Self::SymLink => 'l',
            Self::Regular => '-',
        }
    }
}
