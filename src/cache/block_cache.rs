//! 分桶块缓存实现
//!
//! # 结构
//!
//! ```text
//! struct BufferCache {
//!     evict_lock: spin::Mutex<()>,              // 驱逐协调锁，仅在未命中时使用
//!     buckets: [spin::Mutex<Bucket>; NBUCKET],   // 元数据 + MRU->LRU 列表
//!     slots: [parking_lot::Mutex<[u8]>; NBUF],   // 内容锁 + 块数据
//! }
//! ```
//!
//! # 加锁顺序
//!
//! 1. 驱逐协调锁总是先于桶锁获取，反过来不允许
//! 2. 任意时刻最多持有一个桶锁；回收时从源桶摘下和插入目标桶是先后两次加锁，不嵌套
//! 3. 桶锁和协调锁都是自旋锁，绝不跨越磁盘 I/O，也绝不在持有时去获取内容锁
//!
//! 这些锁全部是私有字段，外部只能通过下面几个按固定顺序加锁的操作间接使用，
//! 所以并发的回收者和查找者之间不可能形成环形等待。
//!
//! # 替换策略
//!
//! 近似 LRU：从目标桶开始依次访问各桶，每个桶内从 LRU 端找第一个未被引用的块。
//! 这不是全局 LRU，但只有真正未命中时才需要遍历，且不同桶的查找互不竞争。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::bucket::Bucket;
use super::buffer::{BufFlags, BufGuard, BufPin, SlotInfo, SlotMeta};
use super::config::CacheConfig;
use crate::block::BlockDevice;
use crate::error::{CacheFault, Error, ErrorKind, Result};
use crate::types::{BlockKey, BlockNo, BufId, DevId};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 查找次数
    pub lookups: u64,
    /// 命中次数（块已在缓存中）
    pub hits: u64,
    /// 未命中次数，即回收缓存块的次数
    ///
    /// 在协调锁下重新检查时命中的查找计入 `hits`，不计入这里
    pub misses: u64,
    /// 从磁盘读取次数
    pub disk_reads: u64,
    /// 写入磁盘次数
    pub disk_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct StatCounters {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}

/// 块缓存
///
/// 显式构造的上下文对象：内核启动时创建一次，之后以 `&BufferCache`
/// （或 `Arc<BufferCache>`）的形式交给所有调用者，运行期间不会销毁。
///
/// # 示例
///
/// ```rust,ignore
/// let cache = BufferCache::new(disk, CacheConfig::default())?;
///
/// let mut buf = cache.bread(ROOTDEV, 46);
/// buf[0] = 0x42;
/// cache.bwrite(&buf);   // 写穿：立即同步写盘
/// cache.brelse(buf);    // 移到所属桶的 MRU 端
/// ```
pub struct BufferCache<D: BlockDevice> {
    /// 底层设备
    device: D,
    /// 配置
    config: CacheConfig,
    /// 驱逐协调锁
    evict_lock: spin::Mutex<()>,
    /// 哈希桶
    buckets: Box<[spin::Mutex<Bucket>]>,
    /// 缓存池：每个缓存块的内容锁和数据
    slots: Box<[Mutex<Box<[u8]>>]>,
    /// 统计信息
    stats: StatCounters,
}

impl<D: BlockDevice> BufferCache<D> {
    /// 创建块缓存
    ///
    /// 一次性分配 `config.nbuf` 个缓存块，按轮转方式分配到各桶：
    /// 第 `i` 个缓存块插入第 `i % nbucket` 个桶的 MRU 端。
    ///
    /// # 错误
    ///
    /// 配置非法，或块大小与设备不一致时返回 `InvalidInput`
    pub fn new(device: D, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        if device.block_size() != config.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "cache block size does not match device block size",
            ));
        }

        let mut buckets: Box<[spin::Mutex<Bucket>]> = (0..config.nbucket)
            .map(|_| spin::Mutex::new(Bucket::new()))
            .collect();
        for id in 0..config.nbuf {
            buckets[id % config.nbucket]
                .get_mut()
                .push_front(SlotMeta::new(id));
        }

        let slots = (0..config.nbuf)
            .map(|_| Mutex::new(alloc::vec![0u8; config.block_size].into_boxed_slice()))
            .collect();

        log::info!(
            "[BCACHE] init: {} buffers, {} buckets, block size {}",
            config.nbuf,
            config.nbucket,
            config.block_size
        );

        Ok(Self {
            device,
            config,
            evict_lock: spin::Mutex::new(()),
            buckets,
            slots,
            stats: StatCounters::default(),
        })
    }

    /// 使用默认缓存池大小和设备的块大小创建块缓存
    pub fn with_default_config(device: D) -> Result<Self> {
        let config = CacheConfig::default().with_block_size(device.block_size());
        Self::new(device, config)
    }

    /// 读取块
    ///
    /// 返回已加锁、内容有效的缓存块。数据无效时（刚回收）同步从磁盘读取。
    /// 同一个块同时只能有一个持有者，其他调用者会阻塞到它被释放。
    ///
    /// # Panics
    ///
    /// 所有缓存块都被引用时以 [`CacheFault::Exhausted`] 终止
    pub fn bread(&self, dev: DevId, blockno: BlockNo) -> BufGuard<'_, D> {
        let mut buf = self.bget(BlockKey::new(dev, blockno));

        if !self.is_valid(buf.id(), buf.key()) {
            self.device.read_block(dev, blockno, buf.data_mut());
            StatCounters::bump(&self.stats.disk_reads);
            self.mark_valid(buf.id(), buf.key());
            log::debug!("[BCACHE] read {} into buf {}", buf.key(), buf.id());
        }

        buf
    }

    /// 把缓存块当前内容同步写入磁盘
    ///
    /// 写穿：没有脏块跟踪和延迟刷新，只有调用本函数时才会写盘。
    pub fn bwrite(&self, buf: &BufGuard<'_, D>) {
        assert!(buf.belongs_to(self), "bwrite: buffer from another cache");

        self.device.write_block(buf.dev(), buf.blockno(), buf.data());
        StatCounters::bump(&self.stats.disk_writes);
        log::debug!("[BCACHE] write {} from buf {}", buf.key(), buf.id());
    }

    /// 释放缓存块
    ///
    /// 先释放内容锁，再归还引用；引用计数归零时移到所属桶的 MRU 端，
    /// 此后它仍作为热缓存保留，直到被回收。与直接丢弃 `buf` 等价。
    pub fn brelse(&self, buf: BufGuard<'_, D>) {
        assert!(buf.belongs_to(self), "brelse: buffer from another cache");
        drop(buf);
    }

    /// 钉住缓存块
    ///
    /// 增加一个不占用内容锁的引用，使块在 [`BufferCache::bunpin`] 之前不会被回收。
    pub fn bpin(&self, buf: &BufGuard<'_, D>) -> BufPin {
        assert!(buf.belongs_to(self), "bpin: buffer from another cache");

        let (id, key) = (buf.id(), buf.key());
        self.with_meta(id, key, |bucket, pos| {
            bucket.meta_mut(pos).refcnt += 1;
        });
        BufPin { id, key }
    }

    /// 取消钉住
    ///
    /// 只减少引用计数，不调整桶内顺序。
    ///
    /// # Panics
    ///
    /// 引用计数已为零时以 [`CacheFault::RefUnderflow`] 终止
    pub fn bunpin(&self, pin: BufPin) {
        self.put_ref(pin.id, pin.key, false);
    }

    /// 缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 底层设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 缓存配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// 缓存块数量
    pub fn capacity(&self) -> usize {
        self.config.nbuf
    }

    /// 哈希桶数量
    pub fn nbucket(&self) -> usize {
        self.config.nbucket
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// 指定桶的 MRU -> LRU 快照
    pub fn bucket_snapshot(&self, bucket: usize) -> Vec<SlotInfo> {
        self.buckets[bucket].lock().snapshot()
    }

    /// 指定桶内的缓存块数量
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets[bucket].lock().len()
    }

    /// 承载 `key` 的缓存块的引用计数，不在缓存中时为 0
    pub fn refcnt_of(&self, key: BlockKey) -> u32 {
        self.buckets[key.bucket(self.config.nbucket)]
            .lock()
            .find_mut(key)
            .map_or(0, |meta| meta.refcnt)
    }

    // ===== 内部实现 =====

    /// 查找缓存块，未命中时回收一个，返回已加锁的缓存块
    fn bget(&self, key: BlockKey) -> BufGuard<'_, D> {
        StatCounters::bump(&self.stats.lookups);
        let target = key.bucket(self.config.nbucket);

        let hit = self.buckets[target].lock().find_mut(key).map(|meta| {
            meta.refcnt += 1;
            meta.id
        });

        let id = match hit {
            Some(id) => {
                StatCounters::bump(&self.stats.hits);
                log::trace!("[BCACHE] get {} HIT buf {}", key, id);
                id
            }
            None => self.recycle(key, target),
        };

        // 桶锁已释放，此处可以阻塞
        BufGuard::new(self, id, key, self.slots[id].lock())
    }

    /// 未命中路径：在协调锁下为 `key` 回收一个未被引用的缓存块
    ///
    /// 返回的缓存块已在目标桶中，并已为调用者计入一个引用。
    fn recycle(&self, key: BlockKey, target: usize) -> BufId {
        let evict = self.evict_lock.lock();

        // 快速路径释放桶锁之后，其他回收者可能已经把这个块放进了目标桶
        {
            let mut bucket = self.buckets[target].lock();
            if let Some(meta) = bucket.find_mut(key) {
                meta.refcnt += 1;
                StatCounters::bump(&self.stats.hits);
                log::trace!("[BCACHE] get {} HIT buf {} (after miss)", key, meta.id);
                return meta.id;
            }
        }

        let nbucket = self.config.nbucket;
        for i in 0..nbucket {
            let victim = self.buckets[(target + i) % nbucket].lock().take_lru_unused();

            if let Some(mut meta) = victim {
                let old = meta.key;
                meta.reassign(key);
                let id = meta.id;
                self.buckets[target].lock().push_front(meta);
                drop(evict);

                StatCounters::bump(&self.stats.misses);
                log::debug!(
                    "[BCACHE] get {} MISS, recycled buf {} (was {:?})",
                    key,
                    id,
                    old
                );
                return id;
            }
        }

        drop(evict);
        CacheFault::Exhausted { key }.raise()
    }

    /// 在 `key` 所属桶的锁下访问缓存块 `id` 的元数据
    fn with_meta<R>(
        &self,
        id: BufId,
        key: BlockKey,
        f: impl FnOnce(&mut Bucket, usize) -> R,
    ) -> R {
        let mut bucket = self.buckets[key.bucket(self.config.nbucket)].lock();
        match bucket.position(id, key) {
            Some(pos) => f(&mut *bucket, pos),
            None => {
                drop(bucket);
                CacheFault::Detached { id, key }.raise()
            }
        }
    }

    fn is_valid(&self, id: BufId, key: BlockKey) -> bool {
        self.with_meta(id, key, |bucket, pos| bucket.meta_mut(pos).is_valid())
    }

    fn mark_valid(&self, id: BufId, key: BlockKey) {
        self.with_meta(id, key, |bucket, pos| {
            bucket.meta_mut(pos).flags.insert(BufFlags::VALID);
        });
    }

    /// 守卫析构时调用：内容锁此时已经释放
    pub(crate) fn release_ref(&self, id: BufId, key: BlockKey) {
        self.put_ref(id, key, true);
        log::trace!("[BCACHE] release {} buf {}", key, id);
    }

    /// 归还一个引用；`demote` 为真且计数归零时移到 MRU 端
    fn put_ref(&self, id: BufId, key: BlockKey, demote: bool) {
        let underflow = self.with_meta(id, key, |bucket, pos| {
            let meta = bucket.meta_mut(pos);
            if meta.refcnt == 0 {
                return true;
            }
            meta.refcnt -= 1;
            if meta.refcnt == 0 && demote {
                bucket.move_to_front(pos);
            }
            false
        });

        if underflow {
            CacheFault::RefUnderflow { id }.raise();
        }
    }
}

impl<D: BlockDevice> core::fmt::Debug for BufferCache<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
