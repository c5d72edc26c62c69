//! Global expiry queue driving per-entry TTL timers.
//!
//! One detached worker thread owns a deadline heap and sleeps on a condvar
//! until the earliest deadline. Scheduled tasks hold only a [`Weak`]
//! reference to their target, so a pending timer never keeps a cache entry
//! (or, transitively, the cache it belongs to) alive, and a detached thread
//! never keeps the process alive past `main`.
//!
//! Cancellation is epoch-based: every arm or cancel bumps the target
//! entry's epoch, and a task carries the epoch it was armed with. A task
//! whose epoch no longer matches does nothing when it fires, so a cancelled
//! or rearmed timer never mutates the cache.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Weak;
use std::thread;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Something the expiry worker can fire a deadline against.
///
/// Implementors check that `epoch` still matches their current timer epoch
/// before acting; a mismatch means the timer was cancelled or rearmed.
pub(crate) trait ExpireTarget: Send + Sync {
    fn expire(&self, epoch: u64);
}

struct ExpiryTask {
    deadline: Instant,
    epoch: u64,
    seq: u64,
    target: Weak<dyn ExpireTarget>,
}

impl PartialEq for ExpiryTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ExpiryTask {}

impl PartialOrd for ExpiryTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpiryTask {
    // Reversed so the binary heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ExpiryQueue {
    tasks: Mutex<BinaryHeap<ExpiryTask>>,
    task_ready: Condvar,
    next_seq: AtomicU64,
}

static EXPIRY_QUEUE: Lazy<ExpiryQueue> = Lazy::new(|| {
    thread::Builder::new()
        .name("memolito-expiry".to_string())
        .spawn(|| EXPIRY_QUEUE.run())
        .expect("failed to spawn expiry worker thread");

    ExpiryQueue {
        tasks: Mutex::new(BinaryHeap::new()),
        task_ready: Condvar::new(),
        next_seq: AtomicU64::new(0),
    }
});

impl ExpiryQueue {
    fn run(&self) {
        let mut tasks = self.tasks.lock();
        loop {
            let now = Instant::now();
            match tasks.peek() {
                None => {
                    self.task_ready.wait(&mut tasks);
                }
                Some(task) if task.deadline <= now => {
                    if let Some(task) = tasks.pop() {
                        // Fire without the queue lock: the target takes the
                        // cache lock, and schedule() must stay callable from
                        // under it.
                        MutexGuard::unlocked(&mut tasks, || {
                            if let Some(target) = task.target.upgrade() {
                                target.expire(task.epoch);
                            }
                        });
                    }
                }
                Some(task) => {
                    let deadline = task.deadline;
                    self.task_ready.wait_until(&mut tasks, deadline);
                }
            }
        }
    }
}

/// Schedules `target.expire(epoch)` to run at `deadline`.
///
/// The worker thread is spawned lazily on the first call.
pub(crate) fn schedule(deadline: Instant, epoch: u64, target: Weak<dyn ExpireTarget>) {
    let queue = &*EXPIRY_QUEUE;
    let seq = queue.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
    queue.tasks.lock().push(ExpiryTask {
        deadline,
        epoch,
        seq,
        target,
    });
    queue.task_ready.notify_one();
}
