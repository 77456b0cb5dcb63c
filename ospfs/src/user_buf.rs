//! 目标缓冲区
//!
//! 读路径不直接写内存，而是经由 [`CopyToUser`] 把数据交给调用者，
//! 以便宿主在目标地址不可写时报告失败。

/// 向调用者提供的缓冲区复制数据
pub trait CopyToUser {
    /// 把 `src` 复制到缓冲区的 `offset` 处，
    /// 返回**未能**复制的字节数，0 表示全部成功。
    fn copy_to_user(&mut self, offset: usize, src: &[u8]) -> usize;
}

impl CopyToUser for [u8] {
    fn copy_to_user(&mut self, offset: usize, src: &[u8]) -> usize {
        let dest = self.get_mut(offset..).unwrap_or_default();
        let n = dest.len().min(src.len());
        dest[..n].copy_from_slice(&src[..n]);
        src.len() - n
    }
}

/// 由多段不连续内存组成的缓冲区，例如跨页的用户空间缓冲区
impl CopyToUser for [&mut [u8]] {
    fn copy_to_user(&mut self, mut offset: usize, mut src: &[u8]) -> usize {
        for segment in self.iter_mut() {
            if src.is_empty() {
                break;
            }
            if offset >= segment.len() {
                offset -= segment.len();
                continue;
            }

            let n = (segment.len() - offset).min(src.len());
            segment[offset..offset + n].copy_from_slice(&src[..n]);
            src = &src[n..];
            offset = 0;
        }

        src.len()
    }
}
