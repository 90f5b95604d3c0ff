//! 块设备接口

use crate::types::{BlockNo, DevId};

/// 块设备接口
///
/// 缓存向下只依赖这一个同步原语：按 (设备号, 块号) 读写一个完整的块。
/// 调用会阻塞到传输完成，并且假定总能成功；设备错误由驱动自行处理，
/// 不会出现在缓存层。
///
/// 缓存在持有缓存块内容锁的情况下调用这些方法，可能有多个线程同时进入，
/// 因此实现必须是 `Send + Sync` 的，并自行保证内部同步。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, DevId, BlockNo};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl BlockDevice for VirtioDisk {
///     fn block_size(&self) -> usize {
///         1024
///     }
///
///     fn read_block(&self, dev: DevId, blockno: BlockNo, buf: &mut [u8]) {
///         // 提交读请求并等待完成
///     }
///
///     fn write_block(&self, dev: DevId, blockno: BlockNo, buf: &[u8]) {
///         // 提交写请求并等待完成
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 读取一个块
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 目标缓冲区，长度恰好为 `block_size()`
    fn read_block(&self, dev: DevId, blockno: BlockNo, buf: &mut [u8]);

    /// 写入一个块
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 源缓冲区，长度恰好为 `block_size()`
    fn write_block(&self, dev: DevId, blockno: BlockNo, buf: &[u8]);
}
