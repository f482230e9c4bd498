//! Snapring - Benchmark & Demo
//!
//! Mengukur:
//! - Latency fast path single-thread (enqueue/dequeue)
//! - Throughput MPMC dengan verifikasi exactly-once
//! - Latency snapshot (`to_vec`) saat producer/consumer aktif
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use snapring::{trace, BoundedRingQueue, QueueConfig, QueueError};

/// Konfigurasi benchmark
struct BenchConfig {
    queue: QueueConfig,
    producers: usize,
    consumers: usize,
    items: u64,
    verbose: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::new(16),
            producers: 4,
            consumers: 4,
            items: 1_000_000,
            verbose: false,
        }
    }
}

/// Statistik run MPMC
struct RunStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    full_retries: AtomicU64,
    empty_polls: AtomicU64,
    checksum: AtomicU64,
}

impl RunStats {
    fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            full_retries: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            checksum: AtomicU64::new(0),
        }
    }

    fn print_stats(&self, elapsed: Duration) {
        let enq = self.enqueued.load(Ordering::Relaxed);
        let deq = self.dequeued.load(Ordering::Relaxed);
        let full = self.full_retries.load(Ordering::Relaxed);
        let empty = self.empty_polls.load(Ordering::Relaxed);

        println!("  Enqueued:      {}", enq);
        println!("  Dequeued:      {}", deq);
        println!("  Full retries:  {}", full);
        println!("  Empty polls:   {}", empty);
        println!(
            "  Throughput:    {:.2} M items/sec",
            deq as f64 / elapsed.as_secs_f64() / 1_000_000.0
        );
    }
}

fn main() {
    trace::init_tracing();
    let config = parse_args();

    println!("🚀 Snapring - Bounded MPMC Ring Queue");
    println!("=====================================\n");

    if let Err(e) = run(&config) {
        eprintln!("❌ Benchmark error: {}", e);
        std::process::exit(1);
    }

    println!("\n✅ All benchmarks complete!");
}

fn run(config: &BenchConfig) -> Result<(), QueueError> {
    benchmark_fast_path(config)?;
    benchmark_mpmc(config)?;
    benchmark_snapshot(config)?;
    Ok(())
}

fn benchmark_fast_path(config: &BenchConfig) -> Result<(), QueueError> {
    println!("📊 Fast Path (single thread)");
    println!("----------------------------");

    let queue: BoundedRingQueue<u64> = BoundedRingQueue::with_config(config.queue)?;
    let iterations = config.items;

    // Warm up
    for i in 0..1000 {
        let _ = queue.try_enqueue(i);
    }
    while queue.try_dequeue().is_some() {}

    let start = Instant::now();
    for i in 0..iterations {
        if queue.try_enqueue(i).is_err() {
            queue.try_dequeue();
            let _ = queue.try_enqueue(i);
        }
    }
    let enqueue_duration = start.elapsed();

    while queue.try_dequeue().is_some() {}
    let batch = queue.capacity() as u64;
    let mut dequeue_duration = Duration::ZERO;
    let mut remaining = iterations;
    while remaining > 0 {
        let n = remaining.min(batch);
        for i in 0..n {
            let _ = queue.try_enqueue(i);
        }
        let start = Instant::now();
        for _ in 0..n {
            queue.try_dequeue();
        }
        dequeue_duration += start.elapsed();
        remaining -= n;
    }

    let enq_ns = enqueue_duration.as_nanos() as f64 / iterations as f64;
    let deq_ns = dequeue_duration.as_nanos() as f64 / iterations as f64;

    println!("  Capacity:   {}", queue.capacity());
    println!("  Operations: {}", iterations);
    println!("  Enqueue latency: {:.2} ns/op", enq_ns);
    println!("  Dequeue latency: {:.2} ns/op\n", deq_ns);

    Ok(())
}

fn benchmark_mpmc(config: &BenchConfig) -> Result<(), QueueError> {
    println!(
        "📊 MPMC ({} producers / {} consumers)",
        config.producers, config.consumers
    );
    println!("--------------------------------------");

    let queue: Arc<BoundedRingQueue<u64>> = Arc::new(BoundedRingQueue::with_config(config.queue)?);
    let stats = Arc::new(RunStats::new());
    let total = config.items;
    let producers = config.producers.max(1) as u64;

    let start = Instant::now();
    let mut handles = Vec::new();

    for p in 0..producers {
        let queue = Arc::clone(&queue);
        let stats = Arc::clone(&stats);
        handles.push(thread::spawn(move || {
            // token unik: p, p + producers, p + 2*producers, ...
            let mut token = p;
            while token < total {
                let mut item = token + 1;
                loop {
                    match queue.try_enqueue(item) {
                        Ok(()) => break,
                        Err(full) => {
                            stats.full_retries.fetch_add(1, Ordering::Relaxed);
                            item = full.into_inner();
                            thread::yield_now();
                        }
                    }
                }
                stats.enqueued.fetch_add(1, Ordering::Relaxed);
                token += producers;
            }
        }));
    }

    for _ in 0..config.consumers.max(1) {
        let queue = Arc::clone(&queue);
        let stats = Arc::clone(&stats);
        handles.push(thread::spawn(move || loop {
            if stats.dequeued.load(Ordering::Relaxed) >= total {
                break;
            }
            match queue.try_dequeue() {
                Some(item) => {
                    stats.checksum.fetch_add(item, Ordering::Relaxed);
                    stats.dequeued.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    stats.empty_polls.fetch_add(1, Ordering::Relaxed);
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("⚠️ worker thread panicked");
        }
    }
    let elapsed = start.elapsed();

    stats.print_stats(elapsed);

    let expected = total * (total + 1) / 2;
    let checksum = stats.checksum.load(Ordering::Relaxed);
    if checksum == expected {
        println!("  Checksum:      OK ({})\n", checksum);
    } else {
        println!("  Checksum:      MISMATCH {} != {} ⚠️\n", checksum, expected);
    }

    Ok(())
}

fn benchmark_snapshot(config: &BenchConfig) -> Result<(), QueueError> {
    println!("📊 Snapshot under load (to_vec)");
    println!("-------------------------------");

    let queue: Arc<BoundedRingQueue<u64>> = Arc::new(BoundedRingQueue::with_config(config.queue)?);
    let running = Arc::new(AtomicBool::new(true));

    let producer = {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut i = 0u64;
            while running.load(Ordering::Relaxed) {
                if queue.try_enqueue(i).is_ok() {
                    i += 1;
                } else {
                    thread::yield_now();
                }
            }
        })
    };

    let consumer = {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if queue.try_dequeue().is_none() {
                    thread::yield_now();
                }
            }
        })
    };

    const SNAPSHOTS: u32 = 1000;
    let mut total_len = 0usize;
    let mut torn = 0u32;
    let mut max_ns = 0u128;

    let start = Instant::now();
    for _ in 0..SNAPSHOTS {
        let t = Instant::now();
        let snapshot = queue.to_vec();
        max_ns = max_ns.max(t.elapsed().as_nanos());

        // item dari satu producer harus berurutan naik satu per satu
        if snapshot.windows(2).any(|w| w[1] != w[0] + 1) {
            torn += 1;
        }
        total_len += snapshot.len();
        if config.verbose {
            println!("   snapshot len={}", snapshot.len());
        }
    }
    let elapsed = start.elapsed();

    running.store(false, Ordering::Relaxed);
    producer.join().ok();
    consumer.join().ok();

    println!("  Snapshots:    {}", SNAPSHOTS);
    println!(
        "  Avg length:   {:.1}",
        total_len as f64 / SNAPSHOTS as f64
    );
    println!(
        "  Avg latency:  {:.2} μs",
        elapsed.as_secs_f64() * 1_000_000.0 / SNAPSHOTS as f64
    );
    println!("  Max latency:  {:.2} μs", max_ns as f64 / 1000.0);
    if torn > 0 {
        println!("  Incoherent:   {} ⚠️", torn);
    } else {
        println!("  Coherent:     all snapshots");
    }

    Ok(())
}

fn parse_args() -> BenchConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = BenchConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--log-capacity" | "-l" => {
                if i + 1 < args.len() {
                    config.queue.log_capacity = args[i + 1].parse().unwrap_or(16);
                    i += 1;
                }
            }
            "--producers" | "-p" => {
                if i + 1 < args.len() {
                    config.producers = args[i + 1].parse().unwrap_or(4);
                    i += 1;
                }
            }
            "--consumers" | "-c" => {
                if i + 1 < args.len() {
                    config.consumers = args[i + 1].parse().unwrap_or(4);
                    i += 1;
                }
            }
            "--items" | "-n" => {
                if i + 1 < args.len() {
                    config.items = args[i + 1].parse().unwrap_or(1_000_000);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Snapring - Bounded MPMC Ring Queue benchmark\n");
                println!("Usage: snapring [OPTIONS]\n");
                println!("Options:");
                println!("  -l, --log-capacity <N>  Capacity exponent, 2..=20 (default: 16)");
                println!("  -p, --producers <N>     Producer threads (default: 4)");
                println!("  -c, --consumers <N>     Consumer threads (default: 4)");
                println!("  -n, --items <N>         Items per run (default: 1000000)");
                println!("  -v, --verbose           Verbose output");
                println!("  -h, --help              Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}
