//! Per-thread pool of visited sets for graph traversal.
//!
//! Marks are epoch stamps, so resetting a set between queries is a counter
//! bump rather than a memset over every node.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

const POOL_SIZE: usize = 4;

thread_local! {
    static POOL: RefCell<Vec<VisitedSet>> = const { RefCell::new(Vec::new()) };
}

pub struct VisitedSet {
    epochs: Vec<u32>,
    epoch: u32,
}

impl VisitedSet {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            epochs: vec![0; capacity.max(1)],
            epoch: 1,
        }
    }

    fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.epochs.fill(0);
            self.epoch = 1;
        }
    }

    #[cfg(test)]
    pub fn is_visited(&self, id: u32) -> bool {
        self.epochs
            .get(id as usize)
            .is_some_and(|&e| e == self.epoch)
    }

    /// Mark `id`; returns `false` if it was already marked.
    #[inline(always)]
    pub fn insert(&mut self, id: u32) -> bool {
        let idx = id as usize;
        if idx >= self.epochs.len() {
            self.epochs.resize((idx + 1).next_power_of_two(), 0);
        }
        if self.epochs[idx] == self.epoch {
            return false;
        }
        self.epochs[idx] = self.epoch;
        true
    }
}

/// Borrowed visited set, returned to the thread's pool on drop.
pub struct VisitedGuard {
    set: VisitedSet,
}

impl VisitedGuard {
    pub fn new(capacity: usize) -> Self {
        let set = POOL.with(|pool| {
            let mut pool = pool.borrow_mut();
            match pool.iter().position(|s| s.epochs.len() >= capacity) {
                Some(idx) => {
                    let mut set = pool.swap_remove(idx);
                    set.reset();
                    set
                }
                None => VisitedSet::with_capacity(capacity),
            }
        });
        Self { set }
    }
}

impl Drop for VisitedGuard {
    fn drop(&mut self) {
        let set = std::mem::replace(
            &mut self.set,
            VisitedSet {
                epochs: Vec::new(),
                epoch: 1,
            },
        );
        POOL.with(|pool| {
            let mut pool = pool.borrow_mut();
            if pool.len() < POOL_SIZE {
                pool.push(set);
            }
        });
    }
}

impl Deref for VisitedGuard {
    type Target = VisitedSet;

    fn deref(&self) -> &VisitedSet {
        &self.set
    }
}

impl DerefMut for VisitedGuard {
    fn deref_mut(&mut self) -> &mut VisitedSet {
        &mut self.set
    }
}
