//! 基础类型定义

use core::fmt;

/// 设备号
pub type DevId = u32;

/// 设备内的块号
pub type BlockNo = u32;

/// 缓存块 ID
///
/// 即缓存块在缓存池中的下标。缓存块的内存位置在整个生命周期内不变，
/// 只有它承载的块身份会被反复更换。
pub type BufId = usize;

/// 块身份：(设备号, 块号)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    /// 设备号
    pub dev: DevId,
    /// 块号
    pub blockno: BlockNo,
}

impl BlockKey {
    /// 创建块身份
    pub const fn new(dev: DevId, blockno: BlockNo) -> Self {
        Self { dev, blockno }
    }

    /// 该块所属的桶下标
    #[inline]
    pub fn bucket(&self, nbucket: usize) -> usize {
        self.blockno as usize % nbucket
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev={} blockno={}", self.dev, self.blockno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_ignores_device() {
        assert_eq!(BlockKey::new(1, 30).bucket(29), 1);
        assert_eq!(BlockKey::new(2, 30).bucket(29), 1);
        assert_eq!(BlockKey::new(1, 29).bucket(29), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockKey::new(1, 7).to_string(), "dev=1 blockno=7");
    }
}
