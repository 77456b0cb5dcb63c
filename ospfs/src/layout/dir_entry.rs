use core::{ptr, slice};

/// 名字的最大长度，最后一字节留给 \0
pub const NAME_MAX_LEN: usize = 123;

/// 目录项：把名字绑定到 inode 编号。
/// inode 编号为 0 的目录项是空槽位，名字没有意义。
#[derive(Debug, Clone)]
#[repr(C)]
pub struct DirEntry {
    inode_id: u32,
    name: [u8; NAME_MAX_LEN + 1],
}

impl Default for DirEntry {
    #[inline]
    fn default() -> Self {
        Self {
            inode_id: 0,
            name: [0; NAME_MAX_LEN + 1],
        }
    }
}

impl DirEntry {
    /// 目录项大小恒为128字节
    pub const SIZE: usize = 128;

    /// 超出 [`NAME_MAX_LEN`] 的部分会被截掉，调用者应事先检查
    #[inline]
    pub fn new(name: &[u8], inode_id: u32) -> Self {
        let len = name.len().min(NAME_MAX_LEN);
        let mut entry = Self {
            inode_id,
            ..Default::default()
        };
        entry.name[..len].copy_from_slice(&name[..len]);
        entry.name[len] = 0;

        entry
    }

    /// 到第一个 \0 为止的名字
    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.inode_id == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;

    #[test]
    fn layout() {
        assert_eq!(mem::size_of::<DirEntry>(), DirEntry::SIZE);
    }

    #[test]
    fn name_is_nul_terminated() {
        let mut entry = DirEntry::new(&[b'x'; NAME_MAX_LEN], 7);
        assert_eq!(entry.name().len(), NAME_MAX_LEN);
        assert_eq!(entry.as_bytes()[4 + NAME_MAX_LEN], 0);

        entry.as_bytes_mut()[4..8].copy_from_slice(b"ab\0c");
        assert_eq!(entry.name(), b"ab");
        assert_eq!(entry.inode_id(), 7);
        assert!(DirEntry::default().is_free());
    }
}
