//! 内存块设备
//!
//! 没有真实硬件时使用的 [`BlockDevice`] 实现，也是测试里的后备存储。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockKey, BlockNo, DevId};

/// 内存块设备
///
/// 支持任意多个设备号，每个块在第一次写入前读出来都是全零。
/// 统计物理读写次数，便于观察缓存命中情况。
pub struct RamDisk {
    /// 块大小（字节）
    block_size: usize,
    /// 已写入过的块
    blocks: spin::Mutex<BTreeMap<BlockKey, Vec<u8>>>,
    /// 每次读写附加的模拟延迟
    latency: Option<Duration>,
    /// 物理读取次数
    physical_reads: AtomicU64,
    /// 物理写入次数
    physical_writes: AtomicU64,
}

impl RamDisk {
    /// 创建内存块设备
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "block size must be non-zero",
            ));
        }

        Ok(Self {
            block_size,
            blocks: spin::Mutex::new(BTreeMap::new()),
            latency: None,
            physical_reads: AtomicU64::new(0),
            physical_writes: AtomicU64::new(0),
        })
    }

    /// 为每次读写加上固定延迟
    ///
    /// 用来模拟慢速磁盘，拉长持有内容锁的时间窗口。
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 物理读取次数
    pub fn physical_read_count(&self) -> u64 {
        self.physical_reads.load(Ordering::Relaxed)
    }

    /// 物理写入次数
    pub fn physical_write_count(&self) -> u64 {
        self.physical_writes.load(Ordering::Relaxed)
    }

    /// 绕过缓存直接查看某个块的内容
    pub fn peek(&self, dev: DevId, blockno: BlockNo) -> Vec<u8> {
        self.blocks
            .lock()
            .get(&BlockKey::new(dev, blockno))
            .cloned()
            .unwrap_or_else(|| alloc::vec![0u8; self.block_size])
    }

    /// 绕过缓存直接写入某个块（不计入物理写入次数）
    ///
    /// `data` 不足一个块时剩余部分补零，超出部分被截断。
    pub fn poke(&self, dev: DevId, blockno: BlockNo, data: &[u8]) {
        let mut block = alloc::vec![0u8; self.block_size];
        let len = data.len().min(self.block_size);
        block[..len].copy_from_slice(&data[..len]);
        self.blocks.lock().insert(BlockKey::new(dev, blockno), block);
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, dev: DevId, blockno: BlockNo, buf: &mut [u8]) {
        self.simulate_latency();
        self.physical_reads.fetch_add(1, Ordering::Relaxed);

        let blocks = self.blocks.lock();
        match blocks.get(&BlockKey::new(dev, blockno)) {
            Some(block) => buf.copy_from_slice(block),
            None => buf.fill(0),
        }
    }

    fn write_block(&self, dev: DevId, blockno: BlockNo, buf: &[u8]) {
        self.simulate_latency();
        self.physical_writes.fetch_add(1, Ordering::Relaxed);

        self.blocks
            .lock()
            .insert(BlockKey::new(dev, blockno), buf.to_vec());
    }
}

impl core::fmt::Debug for RamDisk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RamDisk")
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.lock().len())
            .field("latency", &self.latency)
            .field("physical_reads", &self.physical_read_count())
            .field("physical_writes", &self.physical_write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_block_size_rejected() {
        let err = RamDisk::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unwritten_block_reads_zero() {
        let disk = RamDisk::new(512).unwrap();
        let mut buf = alloc::vec![0xAAu8; 512];
        disk.read_block(1, 9, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.physical_read_count(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let disk = RamDisk::new(512).unwrap();
        let data = alloc::vec![0x42u8; 512];
        disk.write_block(1, 3, &data);

        let mut buf = alloc::vec![0u8; 512];
        disk.read_block(1, 3, &mut buf);
        assert_eq!(buf, data);
        assert_eq!(disk.physical_write_count(), 1);

        // 不同设备号互不影响
        disk.read_block(2, 3, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_peek_poke_bypass_counters() {
        let disk = RamDisk::new(16).unwrap();
        disk.poke(1, 0, b"hello");

        let block = disk.peek(1, 0);
        assert_eq!(&block[..5], b"hello");
        assert!(block[5..].iter().all(|&b| b == 0));
        assert_eq!(disk.physical_read_count(), 0);
        assert_eq!(disk.physical_write_count(), 0);
    }
}
