use enumflags2::{BitFlags, bitflags};

use crate::DirEntryType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub inode: u64,
    pub kind: DirEntryType,
    /// 权限位，原样来自 inode
    pub mode: u32,
    /// 硬链接个数
    pub links: u32,
    /// File size
    pub size: u64,
    /// Optimal I/O block size
    pub block_size: u64,
    /// Occupying data blocks
    pub blocks: u64,
}

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o001,
    OtherWrite = 0o002,
    OtherRead = 0o004,
    GroupExec = 0o010,
    GroupWrite = 0o020,
    GroupRead = 0o040,
    OwnerExec = 0o100,
    OwnerWrite = 0o200,
    OwnerRead = 0o400,
}

impl Stat {
    #[inline]
    pub fn permissions(&self) -> BitFlags<Permission> {
        BitFlags::from_bits_truncate(self.mode)
    }

    /// `rwxr-xr-x` 形式的权限串
    pub fn permission_string(&self) -> [u8; 9] {
        const ORDER: [(Permission, u8); 9] = [
            (Permission::OwnerRead, b'r'),
            (Permission::OwnerWrite, b'w'),
            (Permission::OwnerExec, b'x'),
            (Permission::GroupRead, b'r'),
            (Permission::GroupWrite, b'w'),
            (Permission::GroupExec, b'x'),
            (Permission::OtherRead, b'r'),
            (Permission::OtherWrite, b'w'),
            (Permission::OtherExec, b'x'),
        ];

        let perms = self.permissions();
        let mut out = [b'-'; 9];
        for (slot, (flag, ch)) in out.iter_mut().zip(ORDER) {
            if perms.contains(flag) {
                *slot = ch;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_string() {
        let stat = Stat {
            inode: 2,
            kind: DirEntryType::Regular,
            mode: 0o100644,
            links: 1,
            size: 0,
            block_size: 1024,
            blocks: 0,
        };
        assert_eq!(&stat.permission_string(), b"rw-r--r--");
        assert!(stat.permissions().contains(Permission::OwnerWrite));
        assert!(!stat.permissions().contains(Permission::OtherWrite));
    }
}
