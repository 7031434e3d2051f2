//! TTL Floor Module
//!
//! A floor is the strong reference that keeps a weakly stored value alive
//! for a minimum lifespan. Floors are released at their deadline by a
//! process-wide reaper thread, so an entry that is never touched again still
//! drops its value on time. Stores only observe the release afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{trace, warn};

/// Type-erased view of a floor used by the reaper.
trait Expire: Send + Sync {
    /// Drops the strong reference if its deadline is at or before `now`.
    ///
    /// Returns the current deadline when the floor is still held, which
    /// happens when it was extended after being scheduled.
    fn expire(&self, now: Instant) -> Option<Instant>;
}

// == Floor ==
/// Strong reference with a sliding deadline.
pub struct Floor<T> {
    held: Mutex<Option<(Arc<T>, Instant)>>,
}

impl<T: Send + Sync + 'static> Floor<T> {
    /// Holds `value` until `deadline` and schedules its release.
    pub fn hold(value: &Arc<T>, deadline: Instant) -> Arc<Self> {
        let floor = Arc::new(Self {
            held: Mutex::new(Some((Arc::clone(value), deadline))),
        });
        let handle: Weak<Floor<T>> = Arc::downgrade(&floor);
        let handle: Weak<dyn Expire> = handle;
        reaper().schedule(handle, deadline);
        floor
    }
}

impl<T> Floor<T> {
    /// True while the reference is held and the deadline is ahead.
    pub fn is_held(&self) -> bool {
        matches!(&*self.held.lock(), Some((_, deadline)) if Instant::now() < *deadline)
    }

    /// Moves the deadline while the floor is still held.
    pub fn extend(&self, deadline: Instant) -> bool {
        let mut held = self.held.lock();
        match held.as_mut() {
            Some((_, current)) if Instant::now() < *current => {
                *current = deadline;
                true
            }
            _ => false,
        }
    }

    /// Drops the strong reference regardless of the deadline.
    pub fn release(&self) {
        let released = self.held.lock().take();
        drop(released);
    }

    /// Time left before release, None once released or due.
    pub fn remaining(&self) -> Option<Duration> {
        match &*self.held.lock() {
            Some((_, deadline)) => deadline.checked_duration_since(Instant::now()),
            None => None,
        }
    }
}

impl<T: Send + Sync> Expire for Floor<T> {
    fn expire(&self, now: Instant) -> Option<Instant> {
        let released = {
            let mut held = self.held.lock();
            if let Some((_, deadline)) = held.as_ref() {
                if now < *deadline {
                    return Some(*deadline);
                }
            }
            held.take()
        };
        drop(released);
        None
    }
}

// == Reaper ==
struct Reaper {
    queue: Mutex<ReaperQueue>,
    wake: Condvar,
}

#[derive(Default)]
struct ReaperQueue {
    /// Floors ordered by deadline, ties broken by insertion order
    pending: BTreeMap<(Instant, u64), Weak<dyn Expire>>,
    next_seq: u64,
}

impl ReaperQueue {
    fn push(&mut self, floor: Weak<dyn Expire>, deadline: Instant) -> bool {
        let earliest = self
            .pending
            .keys()
            .next()
            .map_or(true, |(first, _)| deadline < *first);
        self.pending.insert((deadline, self.next_seq), floor);
        self.next_seq += 1;
        earliest
    }
}

static REAPER: OnceLock<Arc<Reaper>> = OnceLock::new();

fn reaper() -> &'static Reaper {
    REAPER.get_or_init(Reaper::start)
}

impl Reaper {
    fn start() -> Arc<Self> {
        let reaper = Arc::new(Self {
            queue: Mutex::new(ReaperQueue::default()),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&reaper);
        let spawned = thread::Builder::new()
            .name("entanglement-floor-reaper".to_string())
            .spawn(move || worker.run());
        if let Err(err) = spawned {
            // Floors then expire lazily on access and on sweep
            warn!("Failed to start floor reaper thread: {}", err);
        }

        reaper
    }

    fn schedule(&self, floor: Weak<dyn Expire>, deadline: Instant) {
        if self.queue.lock().push(floor, deadline) {
            self.wake.notify_one();
        }
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            let next = queue.pending.keys().next().copied();
            let Some((deadline, seq)) = next else {
                self.wake.wait(&mut queue);
                continue;
            };

            let now = Instant::now();
            if now < deadline {
                self.wake.wait_until(&mut queue, deadline);
                continue;
            }

            let Some(handle) = queue.pending.remove(&(deadline, seq)) else {
                continue;
            };
            let Some(floor) = handle.upgrade() else {
                continue;
            };

            // Released values may run arbitrary destructors, so not under the queue lock
            let extended = MutexGuard::unlocked(&mut queue, move || floor.expire(now));
            match extended {
                Some(next) => {
                    queue.push(handle, next);
                    trace!("Floor extended, rescheduled");
                }
                None => trace!("Floor released"),
            }
        }
    }
}
