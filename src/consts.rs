//! 块缓存常量定义
//!
//! 默认值取自内核参数表：
//! - 缓存块数量等于单个文件系统操作最多写入块数的三倍
//! - 桶数量取素数，让连续块号尽量分散到不同的桶

//=============================================================================
// 块大小
//=============================================================================

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;

//=============================================================================
// 缓存池
//=============================================================================

/// 单个文件系统操作最多写入的块数
pub const MAXOPBLOCKS: usize = 10;

/// 默认缓存块数量
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// 默认哈希桶数量
pub const NBUCKET: usize = 29;

//=============================================================================
// 设备
//=============================================================================

/// 根文件系统所在设备号
pub const ROOTDEV: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(NBUF, 30);
        assert_eq!(NBUCKET, 29);
        // 默认配置下桶数少于缓存块数，每个桶至少有一个初始块
        assert!(NBUCKET <= NBUF);
    }
}
