// src/display/lock.rs

//! A recursive mutex that can be released and re-taken explicitly.
//!
//! Each display is guarded by one of these. It differs from a guard-based
//! mutex in that `lock` and `unlock` are separate calls: the display code
//! needs to drop the lock around a re-entrant call (for example a driver call
//! that may call back into the platform) while still holding a reference to
//! the display.

use log::error;
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug, Default)]
pub struct RecursiveLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl RecursiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the calling thread owns the lock. Re-entrant.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    return;
                }
                Some(t) if t == me => {
                    owner.depth += 1;
                    return;
                }
                Some(_) => self.released.wait(&mut owner),
            }
        }
    }

    /// Takes the lock if it is free or already held by this thread.
    pub fn try_lock(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        match owner.thread {
            None => {
                owner.thread = Some(me);
                owner.depth = 1;
                true
            }
            Some(t) if t == me => {
                owner.depth += 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Releases one level of ownership.
    ///
    /// # Panics
    ///
    /// If the calling thread does not hold the lock. Display guards are
    /// `!Send`, so only a stray manual `unlock` can get here.
    pub fn unlock(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if owner.thread != Some(me) {
            drop(owner);
            error!("Display lock released by a thread that does not hold it");
            panic!("unbalanced display unlock");
        }
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.lock().thread == Some(thread::current().id())
    }

    /// Recursion depth of the current owner, 0 if unowned.
    pub fn depth(&self) -> usize {
        self.owner.lock().depth
    }
}
