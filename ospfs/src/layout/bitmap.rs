use vfs::Error;

use crate::BLOCK_BITS;
use crate::block_cache::BlockCacheManager;

/// 位图区域内块的结构
type BitmapBlock = [u64; BLOCK_BITS / 64];

/// 空闲块位图，每一位对应磁盘上的一个块，置位表示已占用。
/// 块编号即位的绝对下标，因此 0 号引导块永远是占用的，
/// 0 可以充当“无块”。
#[derive(Debug)]
pub struct Bitmap {
    /// 位图的起始块
    start_block_id: usize,
    /// 位图占用块数
    blocks: usize,
}

/// 块编号
struct BlockID(u32);

impl Bitmap {
    #[inline]
    pub fn new(start_block_id: usize, blocks: usize) -> Self {
        Self {
            start_block_id,
            blocks,
        }
    }

    /// 容纳 `nblocks` 个块的位图需要的块数
    #[inline]
    pub fn blocks_for(nblocks: u32) -> u32 {
        (nblocks as usize).div_ceil(BLOCK_BITS) as u32
    }

    /// 位图所指示区域的总块数
    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks * BLOCK_BITS
    }

    /// 分配新的块，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&self, cache: &BlockCacheManager) -> Option<u32> {
        // 遍历位图区域内所有的块，寻找块内还有剩余空间的bit组(即还有0)
        for block_index in 0..self.blocks {
            let block = cache.get(self.start_block_id + block_index);
            let mut block = block.lock();
            let bitmap_block: &mut BitmapBlock = block.get_mut(0);

            let Some((group_index, ingroup_index)) =
                bitmap_block
                    .iter()
                    .enumerate()
                    .find_map(|(group_index, &bits)| {
                        (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
                    })
            else {
                continue;
            };

            bitmap_block[group_index] |= 1 << ingroup_index;
            return Some(BlockID::encode(
                block_index,
                group_index,
                ingroup_index as usize,
            ));
        }

        None
    }

    /// 把某块标记为占用，格式化时用于元数据区和越界的填充位
    pub fn mark(&self, cache: &BlockCacheManager, block_id: u32) {
        let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
        cache
            .get(self.start_block_id + block_index)
            .lock()
            .map_mut(0, |bitmap_block: &mut BitmapBlock| {
                bitmap_block[group_index] |= 1 << ingroup_index;
            });
    }

    pub fn dealloc(&self, cache: &BlockCacheManager, block_id: u32) -> Result<(), Error> {
        let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
        if block_index >= self.blocks {
            log::error!("freeing block {block_id} outside the bitmap");
            return Err(Error::Io);
        }

        let block = cache.get(self.start_block_id + block_index);
        let mut block = block.lock();
        let bitmap_block: &mut BitmapBlock = block.get_mut(0);

        // 编号一定得有对应的位
        if bitmap_block[group_index] & (1 << ingroup_index) == 0 {
            log::error!("block {block_id} freed twice");
            return Err(Error::Io);
        }

        bitmap_block[group_index] &= !(1 << ingroup_index);
        Ok(())
    }
}

impl BlockID {
    /// 线性映射编码得到块ID
    #[inline]
    fn encode(block_index: usize, group_index: usize, ingroup_index: usize) -> u32 {
        (block_index * BLOCK_BITS + group_index * 64 + ingroup_index) as u32
    }

    fn decode(self) -> (usize, usize, usize) {
        let mut block_id = self.0 as usize;

        let block_index = block_id / BLOCK_BITS;
        block_id %= BLOCK_BITS;
        (block_index, block_id / 64, block_id % 64)
    }
}
