//! Snapring - Bounded lock-free MPMC ring queue
//!
//! Arsitektur:
//! - Fixed capacity: power of 2, `1 << log_capacity` dengan eksponen di `[2, 20]`
//! - Lock-Free: enqueue/dequeue/peek/count hanya memakai atomic CAS + yield
//! - Snapshot: `to_vec`/`copy_to`/`clear` mengunci kedua cursor ke sentinel
//!   `LOCKED` untuk melihat satu titik waktu yang konsisten
//!
//! ```
//! use snapring::BoundedRingQueue;
//!
//! let queue = BoundedRingQueue::new(2).unwrap();
//! assert!(queue.try_enqueue("a").is_ok());
//! assert_eq!(queue.to_vec(), vec!["a"]);
//! assert_eq!(queue.try_dequeue(), Some("a"));
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod trace;

mod sync;

pub use config::{QueueConfig, MAX_LOG_CAPACITY, MIN_LOG_CAPACITY};
pub use error::{Full, QueueError};
pub use queue::BoundedRingQueue;
