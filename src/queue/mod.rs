//! Queue module: Bounded MPMC Ring Queue dengan snapshot konsisten
//!
//! Prinsip desain:
//! - Lock-Free fast path: hanya CAS pada cursor, tidak ada Mutex
//! - Exclusive berbasis sentinel: snapshot/clear mengunci cursor, bukan OS lock
//! - No-Allocation: semua slot pre-allocated saat init

mod cursor;
mod ring;
mod slot;

pub use ring::BoundedRingQueue;
