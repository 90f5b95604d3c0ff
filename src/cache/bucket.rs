//! 哈希桶
//!
//! 每个桶是一个按最近释放时间排序的缓存块列表：
//! 头部是最近释放的（MRU），尾部是最久未释放的（LRU）。
//!
//! 缓存块的元数据记录（[`SlotMeta`]）就保存在它所属桶的列表里，
//! 所以"修改元数据必须持有当前所属桶的锁"由类型直接保证：
//! 拿不到桶锁就拿不到元数据。回收时元数据记录从源桶摘下、插入目标桶，
//! 随缓存块一起迁移。

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::buffer::{SlotInfo, SlotMeta};
use crate::types::{BlockKey, BufId};

/// 哈希桶内容（由桶的自旋锁保护）
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    /// MRU -> LRU
    entries: VecDeque<SlotMeta>,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// 桶内缓存块数量
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// 插入到 MRU 端
    pub(crate) fn push_front(&mut self, meta: SlotMeta) {
        self.entries.push_front(meta);
    }

    /// 按块身份查找
    pub(crate) fn find_mut(&mut self, key: BlockKey) -> Option<&mut SlotMeta> {
        self.entries.iter_mut().find(|meta| meta.key == Some(key))
    }

    /// 查找承载 `key` 的缓存块 `id` 的位置
    pub(crate) fn position(&self, id: BufId, key: BlockKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|meta| meta.id == id && meta.key == Some(key))
    }

    /// `pos` 必须来自 [`Bucket::position`]
    pub(crate) fn meta_mut(&mut self, pos: usize) -> &mut SlotMeta {
        &mut self.entries[pos]
    }

    /// 从 LRU 端向 MRU 端查找第一个未被引用的缓存块，并把它摘下
    pub(crate) fn take_lru_unused(&mut self) -> Option<SlotMeta> {
        let pos = self.entries.iter().rposition(|meta| meta.refcnt == 0)?;
        self.entries.remove(pos)
    }

    /// 把指定位置的缓存块移到 MRU 端
    pub(crate) fn move_to_front(&mut self, pos: usize) {
        if pos == 0 {
            return;
        }
        if let Some(meta) = self.entries.remove(pos) {
            self.entries.push_front(meta);
        }
    }

    /// MRU -> LRU 顺序的只读快照
    pub(crate) fn snapshot(&self) -> Vec<SlotInfo> {
        self.entries.iter().map(SlotInfo::from).collect()
    }
}
