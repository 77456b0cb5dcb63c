use derive_more::Display;

pub type Result<T> = core::result::Result<T, Error>;

/// 文件系统操作向宿主 VFS 报告的错误
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 结构不一致、类型不符或块无法解析
    #[display(fmt = "input/output error")]
    Io,
    /// 目标缓冲区不可写
    #[display(fmt = "bad address")]
    Fault,
    #[display(fmt = "file name too long")]
    NameTooLong,
    #[display(fmt = "file exists")]
    AlreadyExists,
    /// 没有空闲 inode 或数据块
    #[display(fmt = "no space left on device")]
    NoSpace,
    #[display(fmt = "out of memory")]
    OutOfMemory,
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "is a directory")]
    IsADirectory,
}

impl Error {
    /// 对应的 errno，宿主以其相反数作为返回值
    pub fn errno(self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::Io => 5,
            Self::OutOfMemory => 12,
            Self::Fault => 14,
            Self::AlreadyExists => 17,
            Self::IsADirectory => 21,
            Self::NoSpace => 28,
            Self::NameTooLong => 36,
        }
    }
}
