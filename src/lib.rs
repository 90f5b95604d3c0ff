//! bcache_core: 教学内核的分桶块缓存
//!
//! 所有对持久化块存储的访问都经过这一层：
//! - 让最近使用的块**常驻内存**
//! - 保证同一个磁盘块同一时刻只有**一个线程**读写
//! - 固定大小的缓存池按块号**分桶加锁**，不相关的块互不竞争
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, RamDisk, ROOTDEV, Result};
//!
//! fn main() -> Result<()> {
//!     let disk = RamDisk::new(1024)?;
//!     let cache = BufferCache::new(disk, CacheConfig::default())?;
//!
//!     // 读取块，返回已加锁的缓存块
//!     let mut buf = cache.bread(ROOTDEV, 1);
//!     buf[..5].copy_from_slice(b"hello");
//!
//!     // 写穿到磁盘，然后释放
//!     cache.bwrite(&buf);
//!     cache.brelse(buf);
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型与致命故障
//! - [`block`] - 块设备抽象
//! - [`cache`] - 块缓存
//! - [`consts`] - 常量定义
//! - [`types`] - 基础类型

#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 块缓存
pub mod cache;

/// 常量定义
pub mod consts;

/// 基础类型
pub mod types;

// ===== 公共导出 =====

// 错误处理
pub use error::{CacheFault, Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDevice, RamDisk};

// 缓存
pub use cache::{BufFlags, BufGuard, BufPin, BufferCache, CacheConfig, CacheStats, SlotInfo};

// 常量与类型
pub use consts::{BSIZE, NBUCKET, NBUF, ROOTDEV};
pub use types::{BlockKey, BlockNo, BufId, DevId};
