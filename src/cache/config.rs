//! 缓存配置

use crate::consts::{BSIZE, NBUCKET, NBUF};
use crate::error::{Error, ErrorKind, Result};

/// 块缓存配置
///
/// 缓存池在构造时一次性分配，之后大小不再变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓存块数量
    pub nbuf: usize,
    /// 哈希桶数量
    pub nbucket: usize,
    /// 块大小（字节），必须与设备一致
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nbuf: NBUF,
            nbucket: NBUCKET,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    /// 设置缓存块数量
    pub fn with_nbuf(mut self, nbuf: usize) -> Self {
        self.nbuf = nbuf;
        self
    }

    /// 设置哈希桶数量
    pub fn with_nbucket(mut self, nbucket: usize) -> Self {
        self.nbucket = nbucket;
        self
    }

    /// 设置块大小
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// 检查配置是否合法
    pub fn validate(&self) -> Result<()> {
        if self.nbuf == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "nbuf must be non-zero"));
        }
        if self.nbucket == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "nbucket must be non-zero",
            ));
        }
        if self.block_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "block size must be non-zero",
            ));
        }
        Ok(())
    }
}
