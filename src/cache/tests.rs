//! 多线程场景下的缓存行为

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{BufferCache, CacheConfig};
use crate::block::RamDisk;
use crate::consts::ROOTDEV;
use crate::types::BlockKey;

const BLOCK_SIZE: usize = 64;

fn setup(nbuf: usize, nbucket: usize, latency: Option<Duration>) -> BufferCache<RamDisk> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut disk = RamDisk::new(BLOCK_SIZE).unwrap();
    if let Some(latency) = latency {
        disk = disk.with_latency(latency);
    }
    let config = CacheConfig::default()
        .with_nbuf(nbuf)
        .with_nbucket(nbucket)
        .with_block_size(BLOCK_SIZE);
    BufferCache::new(disk, config).unwrap()
}

/// 所有桶里的缓存块，检查全局不变量
fn assert_pool_consistent(cache: &BufferCache<RamDisk>) {
    let mut ids = BTreeSet::new();
    let mut keys = BTreeSet::new();
    for bucket in 0..cache.nbucket() {
        for info in cache.bucket_snapshot(bucket) {
            assert!(ids.insert(info.id), "buf {} in two buckets", info.id);
            if let Some(key) = info.key {
                assert_eq!(key.bucket(cache.nbucket()), bucket, "buf {} misplaced", info.id);
                assert!(keys.insert(key), "{} cached twice", key);
            }
        }
    }
    assert_eq!(ids.len(), cache.capacity());
}

fn read_counter(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    u64::from_le_bytes(bytes)
}

#[test]
fn test_racing_misses_share_one_buffer() {
    const THREADS: usize = 8;
    let cache = setup(8, 3, Some(Duration::from_millis(2)));
    let barrier = Barrier::new(THREADS);
    let holders = AtomicUsize::new(0);

    let ids: Vec<_> = thread::scope(|s| {
        let (cache, barrier, holders) = (&cache, &barrier, &holders);
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            handles.push(s.spawn(move || {
                barrier.wait();
                let buf = cache.bread(ROOTDEV, 5);
                // 同一时刻只有一个持有者
                assert_eq!(holders.fetch_add(1, Ordering::SeqCst), 0);
                thread::sleep(Duration::from_millis(1));
                holders.fetch_sub(1, Ordering::SeqCst);
                let id = buf.id();
                cache.brelse(buf);
                id
            }));
        }
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.device().physical_read_count(), 1);
    assert_eq!(cache.refcnt_of(BlockKey::new(ROOTDEV, 5)), 0);
    assert_eq!(cache.stats().misses, 1);
    assert_pool_consistent(&cache);
}

#[test]
fn test_second_reader_blocks_until_release() {
    let cache = setup(4, 2, None);
    let barrier = Barrier::new(2);
    let released = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let buf = cache.bread(ROOTDEV, 7);
            barrier.wait();
            thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            cache.brelse(buf);
        });
        s.spawn(|| {
            barrier.wait();
            let buf = cache.bread(ROOTDEV, 7);
            assert!(released.load(Ordering::SeqCst));
            cache.brelse(buf);
        });
    });

    assert_eq!(cache.device().physical_read_count(), 1);
}

#[test]
fn test_distinct_blocks_do_not_block_each_other() {
    let cache = setup(4, 2, None);

    let held = cache.bread(ROOTDEV, 0);
    thread::scope(|s| {
        // 同一个桶、不同的块：只短暂竞争桶锁，不等待内容锁
        s.spawn(|| drop(cache.bread(ROOTDEV, 2)));
        // 不同的桶
        s.spawn(|| drop(cache.bread(ROOTDEV, 1)));
    });
    cache.brelse(held);
    assert_pool_consistent(&cache);
}

#[test]
fn test_concurrent_increments_survive_recycling() {
    const THREADS: usize = 8;
    const OPS: usize = 300;
    const BLOCKS: u32 = 40;
    // 每个线程同时最多持有一个块，缓存块足够；块数多于缓存块，强制反复回收
    let cache = setup(16, 5, None);

    thread::scope(|s| {
        for t in 0..THREADS {
            let cache = &cache;
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                for _ in 0..OPS {
                    let blockno = rng.gen_range(0..BLOCKS);
                    let mut buf = cache.bread(ROOTDEV, blockno);
                    let value = read_counter(&buf) + 1;
                    buf[..8].copy_from_slice(&value.to_le_bytes());
                    cache.bwrite(&buf);
                    cache.brelse(buf);
                }
            });
        }
    });

    let total: u64 = (0..BLOCKS)
        .map(|blockno| read_counter(&cache.device().peek(ROOTDEV, blockno)))
        .sum();
    assert_eq!(total, (THREADS * OPS) as u64);

    let stats = cache.stats();
    assert_eq!(stats.lookups, (THREADS * OPS) as u64);
    assert_eq!(stats.hits + stats.misses, stats.lookups);
    assert!(stats.misses > BLOCKS as u64 - 16);
    assert_eq!(stats.disk_writes, (THREADS * OPS) as u64);

    for bucket in 0..cache.nbucket() {
        assert!(cache.bucket_snapshot(bucket).iter().all(|info| info.refcnt == 0));
    }
    assert_pool_consistent(&cache);
}

#[test]
fn test_read_after_write_through_recycling() {
    let cache = setup(4, 2, None);

    let mut buf = cache.bread(ROOTDEV, 3);
    buf.fill(0x5A);
    cache.bwrite(&buf);
    cache.brelse(buf);

    // 读入更多的块，把 block 3 挤出缓存
    for blockno in 10..20 {
        drop(cache.bread(ROOTDEV, blockno));
    }
    assert_eq!(cache.refcnt_of(BlockKey::new(ROOTDEV, 3)), 0);
    let reads_before = cache.device().physical_read_count();

    let buf = cache.bread(ROOTDEV, 3);
    assert!(buf.iter().all(|&b| b == 0x5A));
    assert_eq!(cache.device().physical_read_count(), reads_before + 1);
}

#[test]
fn test_scenario_bucket_local_victim() {
    let cache = setup(30, 29, None);
    cache.device().poke(ROOTDEV, 30, b"thirty");

    let mut slot_of = Vec::new();
    for blockno in 0..30 {
        let buf = cache.bread(ROOTDEV, blockno);
        slot_of.push(buf.id());
        cache.brelse(buf);
    }
    assert_eq!(cache.device().physical_read_count(), 30);

    // block 30 映射到 1 号桶，桶内唯一的未引用缓存块承载 block 1
    let buf = cache.bread(ROOTDEV, 30);
    assert_eq!(buf.id(), slot_of[1]);
    assert_eq!(&buf[..6], b"thirty");
    assert_eq!(cache.device().physical_read_count(), 31);
    drop(buf);

    assert_eq!(cache.refcnt_of(BlockKey::new(ROOTDEV, 1)), 0);
    let bucket1: Vec<_> = cache.bucket_snapshot(1).iter().filter_map(|i| i.key).collect();
    assert_eq!(bucket1, [BlockKey::new(ROOTDEV, 30)]);
    // block 0 仍然是热缓存
    let buf = cache.bread(ROOTDEV, 0);
    assert_eq!(buf.id(), slot_of[0]);
    assert_eq!(cache.device().physical_read_count(), 31);
    drop(buf);
    assert_pool_consistent(&cache);
}

#[test]
fn test_scenario_skips_referenced_in_target_bucket() {
    let cache = setup(30, 29, None);

    let mut slot_of = Vec::new();
    for blockno in 0..30 {
        let buf = cache.bread(ROOTDEV, blockno);
        slot_of.push(buf.id());
        cache.brelse(buf);
    }

    // block 1 仍被引用，遍历继续到 2 号桶
    let held = cache.bread(ROOTDEV, 1);
    let buf = cache.bread(ROOTDEV, 30);
    assert_eq!(buf.id(), slot_of[2]);
    assert_ne!(buf.id(), held.id());
    drop(buf);
    drop(held);
    assert_pool_consistent(&cache);
}

#[test]
fn test_scenario_single_bucket_is_global_lru() {
    let cache = setup(30, 1, None);

    let mut slot_of = Vec::new();
    for blockno in 0..30 {
        let buf = cache.bread(ROOTDEV, blockno);
        slot_of.push(buf.id());
        cache.brelse(buf);
    }

    let buf = cache.bread(ROOTDEV, 30);
    assert_eq!(buf.id(), slot_of[0]);
    assert_eq!(cache.device().physical_read_count(), 31);
    drop(buf);
    assert_eq!(cache.refcnt_of(BlockKey::new(ROOTDEV, 0)), 0);
    assert!(cache
        .bucket_snapshot(0)
        .iter()
        .all(|info| info.key != Some(BlockKey::new(ROOTDEV, 0))));
}

#[test]
fn test_pinned_blocks_stay_resident_across_threads() {
    let cache = setup(6, 2, None);

    let pins: Vec<_> = (0..3)
        .map(|blockno| {
            let mut buf = cache.bread(ROOTDEV, blockno);
            buf[0] = blockno as u8 + 1;
            let pin = cache.bpin(&buf);
            cache.brelse(buf);
            pin
        })
        .collect();

    // 其他线程大量读取，只能回收剩下的 3 个缓存块
    thread::scope(|s| {
        for t in 0..3u32 {
            let cache = &cache;
            s.spawn(move || {
                for blockno in 100..120 {
                    drop(cache.bread(ROOTDEV, blockno + t * 100));
                }
            });
        }
    });

    // 钉住的块从未写盘，内容仍在缓存中说明没有被回收
    for (blockno, pin) in pins.into_iter().enumerate() {
        let buf = cache.bread(ROOTDEV, blockno as u32);
        assert_eq!(buf.id(), pin.id());
        assert_eq!(buf[0], blockno as u8 + 1);
        drop(buf);
        cache.bunpin(pin);
    }
    assert_pool_consistent(&cache);
}
