//! 块缓存模块
//!
//! 文件系统和写前日志访问磁盘块的唯一入口：让最近使用的块常驻内存，
//! 并保证同一个磁盘块同一时刻只被一个线程读写。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存上下文：固定大小的缓存池、哈希桶、驱逐协调锁
//! - [`BufGuard`] - 已加锁的缓存块，持有期间独占块数据
//! - [`BufPin`] - 钉住凭证，不占用内容锁地让块常驻
//! - [`CacheConfig`] - 缓存池大小、桶数量、块大小
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 接口
//!
//! | 操作 | 函数 | 前置条件 |
//! |------|------|----------|
//! | 读   | [`BufferCache::bread`]  | 无 |
//! | 写   | [`BufferCache::bwrite`] | 持有 `BufGuard` |
//! | 释放 | [`BufferCache::brelse`] | 持有 `BufGuard`（消费它） |
//! | 钉住 | [`BufferCache::bpin`]   | 持有 `BufGuard` |
//! | 取消 | [`BufferCache::bunpin`] | 持有 `BufPin`（消费它） |
//!
//! # 两种锁
//!
//! - 桶锁 / 驱逐协调锁：`spin::Mutex`，只保护链表结构和元数据，持有时间极短
//! - 内容锁：`parking_lot::Mutex`，拿不到时线程挂起，可以跨越磁盘 I/O
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, RamDisk, ROOTDEV};
//!
//! let disk = RamDisk::new(1024)?;
//! let cache = BufferCache::new(disk, CacheConfig::default())?;
//!
//! let mut buf = cache.bread(ROOTDEV, 1);
//! buf[0] = 42;
//! cache.bwrite(&buf);
//!
//! // 写前日志：提交前让块常驻
//! let pin = cache.bpin(&buf);
//! cache.brelse(buf);
//! // ...
//! cache.bunpin(pin);
//! ```

mod block_cache;
mod bucket;
mod buffer;
mod config;

#[cfg(test)]
mod tests;

pub use block_cache::{BufferCache, CacheStats};
pub use buffer::{BufFlags, BufGuard, BufPin, SlotInfo};
pub use config::CacheConfig;
