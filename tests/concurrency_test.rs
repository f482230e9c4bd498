//! Concurrency Test - Multi-Producer Multi-Consumer
//!
//! Verifikasi di bawah beban thread nyata:
//! - Tidak ada item hilang atau terduplikasi
//! - Snapshot selalu koheren walau producer/consumer aktif
//! - Clear aman bersamaan dengan fast path
//!
//! Usage:
//!   cargo test --release --test concurrency_test -- --nocapture

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use snapring::BoundedRingQueue;

/// Penghitung bersama untuk satu run
struct Tally {
    dequeued: AtomicU64,
    full_retries: AtomicU64,
}

impl Tally {
    fn new() -> Self {
        Self {
            dequeued: AtomicU64::new(0),
            full_retries: AtomicU64::new(0),
        }
    }
}

/// P producer mengirim token unik `0..total`, Q consumer mengumpulkan sampai `total`.
fn run_exactly_once(log_capacity: u32, producers: u64, consumers: usize, total: u64) {
    let queue: Arc<BoundedRingQueue<u64>> = Arc::new(BoundedRingQueue::new(log_capacity).unwrap());
    let tally = Arc::new(Tally::new());
    let barrier = Arc::new(Barrier::new(producers as usize + consumers));
    let mut producer_handles = Vec::new();
    let mut consumer_handles = Vec::new();

    for p in 0..producers {
        let queue = Arc::clone(&queue);
        let tally = Arc::clone(&tally);
        let barrier = Arc::clone(&barrier);
        producer_handles.push(thread::spawn(move || {
            barrier.wait();
            let mut token = p;
            while token < total {
                let mut item = token;
                while let Err(full) = queue.try_enqueue(item) {
                    tally.full_retries.fetch_add(1, Ordering::Relaxed);
                    item = full.into_inner();
                    thread::yield_now();
                }
                token += producers;
            }
        }));
    }

    for _ in 0..consumers {
        let queue = Arc::clone(&queue);
        let tally = Arc::clone(&tally);
        let barrier = Arc::clone(&barrier);
        consumer_handles.push(thread::spawn(move || {
            barrier.wait();
            let mut collected = Vec::new();
            while tally.dequeued.load(Ordering::Relaxed) < total {
                match queue.try_dequeue() {
                    Some(item) => {
                        collected.push(item);
                        tally.dequeued.fetch_add(1, Ordering::Relaxed);
                    }
                    None => thread::yield_now(),
                }
            }
            collected
        }));
    }

    for h in producer_handles {
        h.join().unwrap();
    }
    let mut all: Vec<u64> = consumer_handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    all.sort_unstable();
    assert_eq!(all, (0..total).collect::<Vec<_>>());
    assert!(queue.is_empty());
}

#[test]
fn test_exactly_once_spsc() {
    run_exactly_once(2, 1, 1, 20_000);
}

#[test]
fn test_exactly_once_mpmc_small_ring() {
    // ring kecil: wraparound dan kondisi penuh sangat sering
    run_exactly_once(2, 4, 4, 40_000);
}

#[test]
fn test_exactly_once_uneven() {
    run_exactly_once(4, 3, 1, 30_000);
    run_exactly_once(4, 1, 3, 30_000);
}

#[test]
fn test_exactly_once_large_ring() {
    run_exactly_once(12, 4, 2, 100_000);
}

#[test]
fn test_single_thread_fifo() {
    let queue = BoundedRingQueue::new(8).unwrap();
    let items: Vec<u32> = (0..200).collect();
    for &i in &items {
        queue.try_enqueue(i).unwrap();
    }
    let out: Vec<u32> = std::iter::from_fn(|| queue.try_dequeue()).collect();
    assert_eq!(out, items);
}

#[test]
fn test_snapshot_coherent_under_load() {
    const PRODUCERS: u64 = 3;

    let queue: Arc<BoundedRingQueue<(u64, u64)>> = Arc::new(BoundedRingQueue::new(5).unwrap());
    let running = Arc::new(AtomicBool::new(true));
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        handles.push(thread::spawn(move || {
            let mut seq = 0u64;
            while running.load(Ordering::Relaxed) {
                if queue.try_enqueue((p, seq)).is_ok() {
                    seq += 1;
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        handles.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if queue.try_dequeue().is_none() {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..2_000 {
        let snapshot = queue.to_vec();
        assert!(snapshot.len() <= queue.capacity());

        // rentang [head, tail) kontigu: item tiap producer harus berurutan tanpa celah
        for p in 0..PRODUCERS {
            let seqs: Vec<u64> = snapshot
                .iter()
                .filter(|(owner, _)| *owner == p)
                .map(|&(_, seq)| seq)
                .collect();
            for pair in seqs.windows(2) {
                assert_eq!(pair[1], pair[0] + 1, "torn snapshot: {:?}", snapshot);
            }
        }

        let mut dest = vec![(u64::MAX, 0); queue.capacity()];
        let n = queue.copy_to(&mut dest, 0).unwrap();
        assert!(dest[..n].iter().all(|(owner, _)| *owner < PRODUCERS));
    }

    running.store(false, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_clear_under_load_never_duplicates() {
    let queue: Arc<BoundedRingQueue<u64>> = Arc::new(BoundedRingQueue::new(4).unwrap());
    let running = Arc::new(AtomicBool::new(true));
    let next_token = Arc::new(AtomicU64::new(0));
    let mut producers = Vec::new();
    let mut consumers = Vec::new();

    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let next_token = Arc::clone(&next_token);
        producers.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let token = next_token.fetch_add(1, Ordering::Relaxed);
                while queue.try_enqueue(token).is_err() {
                    if !running.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        consumers.push(thread::spawn(move || {
            let mut seen = Vec::new();
            while running.load(Ordering::Relaxed) {
                match queue.try_dequeue() {
                    Some(token) => seen.push(token),
                    None => thread::yield_now(),
                }
            }
            seen
        }));
    }

    for _ in 0..500 {
        queue.clear();
        let snapshot = queue.to_vec();
        assert!(snapshot.len() <= queue.capacity());
    }

    running.store(false, Ordering::Relaxed);
    for h in producers {
        h.join().unwrap();
    }
    let mut unique = HashSet::new();
    for h in consumers {
        for token in h.join().unwrap() {
            assert!(unique.insert(token), "token {} dequeued twice", token);
        }
    }

    // setelah semua thread berhenti
    queue.clear();
    assert_eq!(queue.try_peek(), None);
    queue.try_enqueue(7).unwrap();
    assert_eq!(queue.to_vec(), vec![7]);
    assert_eq!(queue.try_dequeue(), Some(7));
}

/// Clear, snapshot, dan fast path bersamaan pada ring terkecil. Snapshot
/// tidak boleh melebihi kapasitas dan semua thread harus terus maju.
#[test]
fn test_clear_with_snapshots_keeps_progress() {
    let queue: Arc<BoundedRingQueue<u64>> = Arc::new(BoundedRingQueue::new(2).unwrap());
    let capacity = queue.capacity();
    let running = Arc::new(AtomicBool::new(true));
    let progress = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for p in 0..4u64 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let progress = Arc::clone(&progress);
        handles.push(thread::spawn(move || {
            let mut i = p;
            while running.load(Ordering::Relaxed) {
                if queue.try_enqueue(i).is_ok() {
                    progress.fetch_add(1, Ordering::Relaxed);
                    i += 4;
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let progress = Arc::clone(&progress);
        handles.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if queue.try_dequeue().is_some() {
                    progress.fetch_add(1, Ordering::Relaxed);
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let progress = Arc::clone(&progress);
        handles.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                queue.clear();
                progress.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let progress = Arc::clone(&progress);
        handles.push(thread::spawn(move || {
            let mut buffer = vec![0u64; capacity];
            while running.load(Ordering::Relaxed) {
                let snapshot = queue.to_vec();
                assert!(
                    snapshot.len() <= capacity,
                    "snapshot of {} items in a ring of {}",
                    snapshot.len(),
                    capacity
                );
                let copied = queue.copy_to(&mut buffer, 0).unwrap();
                assert!(copied <= capacity);
                assert!(queue.count() <= capacity);
                progress.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    // watchdog: setiap jendela harus ada kemajuan
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut last = progress.load(Ordering::Relaxed);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(500));
        let now = progress.load(Ordering::Relaxed);
        if now == last {
            // thread yang macet tidak di-join
            panic!("queue stalled at {} operations", now);
        }
        last = now;
    }

    running.store(false, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }
    assert!(queue.to_vec().len() <= capacity);
}

#[test]
fn test_peek_races_with_dequeue() {
    let queue: Arc<BoundedRingQueue<String>> = Arc::new(BoundedRingQueue::new(3).unwrap());
    let running = Arc::new(AtomicBool::new(true));
    let mut handles = Vec::new();

    {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        handles.push(thread::spawn(move || {
            let mut i = 0u64;
            while running.load(Ordering::Relaxed) {
                if queue.try_enqueue(format!("item-{}", i)).is_ok() {
                    i += 1;
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        handles.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if let Some(s) = queue.try_dequeue() {
                    assert!(s.starts_with("item-"));
                }
            }
        }));
    }

    for _ in 0..50_000 {
        if let Some(s) = queue.try_peek() {
            assert!(s.starts_with("item-"));
        }
    }

    running.store(false, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_drop_after_concurrent_use_releases_items() {
    let tracker = Arc::new(());
    {
        let queue: Arc<BoundedRingQueue<Arc<()>>> = Arc::new(BoundedRingQueue::new(6).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = queue.try_enqueue(Arc::clone(&tracker));
                        if queue.count() > 32 {
                            queue.try_dequeue();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(Arc::strong_count(&tracker) > 1);
    }
    assert_eq!(Arc::strong_count(&tracker), 1);
}
