//! 缓存块结构
//!
//! 一个缓存块由两部分组成，分别受两种锁保护：
//!
//! - 元数据 [`SlotMeta`]（身份、引用计数、有效标志）：存放在所属桶的列表里，
//!   受桶的自旋锁保护
//! - 数据：存放在缓存池里，受阻塞式的内容锁保护，可以跨越磁盘 I/O 持有
//!
//! 调用方只能通过 [`BufGuard`] 接触数据。守卫存在即代表持有内容锁，
//! 因此 `bwrite` / `brelse` "必须持有内容锁"的前置条件由类型保证，
//! 守卫被消费后也就不可能重复释放。

use alloc::boxed::Box;
use core::ops::{Deref, DerefMut};

use bitflags::bitflags;
use parking_lot::MutexGuard;

use super::BufferCache;
use crate::block::BlockDevice;
use crate::types::{BlockKey, BlockNo, BufId, DevId};

bitflags! {
    /// 缓存块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u8 {
        /// 数据与磁盘内容一致
        const VALID = 0x01;
    }
}

/// 缓存块元数据
///
/// 由所属桶的锁保护，随缓存块在桶之间迁移。
#[derive(Debug, Clone)]
pub(crate) struct SlotMeta {
    /// 缓存块 ID（在缓存池中的下标）
    pub(crate) id: BufId,
    /// 当前承载的块；从未使用过的缓存块为 `None`
    pub(crate) key: Option<BlockKey>,
    /// 引用计数
    pub(crate) refcnt: u32,
    /// 状态标志
    pub(crate) flags: BufFlags,
}

impl SlotMeta {
    pub(crate) fn new(id: BufId) -> Self {
        Self {
            id,
            key: None,
            refcnt: 0,
            flags: BufFlags::empty(),
        }
    }

    /// 改为承载另一个块
    ///
    /// 数据尚未从磁盘读入，所以清除 VALID；调用者即第一个引用者。
    pub(crate) fn reassign(&mut self, key: BlockKey) {
        self.key = Some(key);
        self.flags.remove(BufFlags::VALID);
        self.refcnt = 1;
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.flags.contains(BufFlags::VALID)
    }
}

/// 缓存块元数据快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// 缓存块 ID
    pub id: BufId,
    /// 当前承载的块
    pub key: Option<BlockKey>,
    /// 引用计数
    pub refcnt: u32,
    /// 数据是否有效
    pub valid: bool,
}

impl From<&SlotMeta> for SlotInfo {
    fn from(meta: &SlotMeta) -> Self {
        Self {
            id: meta.id,
            key: meta.key,
            refcnt: meta.refcnt,
            valid: meta.is_valid(),
        }
    }
}

/// 已加锁的缓存块
///
/// 由 [`BufferCache::bread`] 返回，对应内核接口里"返回已加锁的 buf"。
/// 持有期间调用方独占该块数据的读写权。
///
/// 通过 [`BufferCache::brelse`] 或直接丢弃来释放：先释放内容锁
/// （唤醒等待者），再在所属桶的锁下归还引用。
pub struct BufGuard<'a, D: BlockDevice> {
    // 字段按声明顺序析构：内容锁必须先于引用归还释放
    data: MutexGuard<'a, Box<[u8]>>,
    held: HeldRef<'a, D>,
}

/// 守卫持有的一个引用
struct HeldRef<'a, D: BlockDevice> {
    cache: &'a BufferCache<D>,
    id: BufId,
    key: BlockKey,
}

impl<D: BlockDevice> Drop for HeldRef<'_, D> {
    fn drop(&mut self) {
        self.cache.release_ref(self.id, self.key);
    }
}

impl<'a, D: BlockDevice> BufGuard<'a, D> {
    pub(crate) fn new(
        cache: &'a BufferCache<D>,
        id: BufId,
        key: BlockKey,
        data: MutexGuard<'a, Box<[u8]>>,
    ) -> Self {
        Self {
            data,
            held: HeldRef { cache, id, key },
        }
    }

    /// 缓存块 ID
    pub fn id(&self) -> BufId {
        self.held.id
    }

    /// 块身份
    pub fn key(&self) -> BlockKey {
        self.held.key
    }

    /// 设备号
    pub fn dev(&self) -> DevId {
        self.held.key.dev
    }

    /// 块号
    pub fn blockno(&self) -> BlockNo {
        self.held.key.blockno
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 块数据（可写）
    ///
    /// 修改只发生在内存里，需要持久化时调用 [`BufferCache::bwrite`]。
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn belongs_to(&self, cache: &BufferCache<D>) -> bool {
        core::ptr::eq(self.held.cache, cache)
    }
}

impl<D: BlockDevice> Deref for BufGuard<'_, D> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl<D: BlockDevice> DerefMut for BufGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl<D: BlockDevice> core::fmt::Debug for BufGuard<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufGuard")
            .field("id", &self.held.id)
            .field("key", &self.held.key)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// 钉住凭证
///
/// 由 [`BufferCache::bpin`] 返回，交给 [`BufferCache::bunpin`] 消费。
/// 凭证存在期间缓存块持有一个额外引用，不会被回收，但不占用内容锁。
/// 写前日志用它让块跨越多个独立的加锁区间常驻内存。
#[must_use = "a pinned buffer stays resident until passed to bunpin"]
#[derive(Debug, PartialEq, Eq)]
pub struct BufPin {
    pub(crate) id: BufId,
    pub(crate) key: BlockKey,
}

impl BufPin {
    /// 缓存块 ID
    pub fn id(&self) -> BufId {
        self.id
    }

    /// 块身份
    pub fn key(&self) -> BlockKey {
        self.key
    }
}
