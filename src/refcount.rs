// src/refcount.rs

//! Intrusive reference counting for tracked objects.
//!
//! Every platform, internal display, display and surface lives behind a
//! [`Ref`]. The count is embedded in the allocation next to the value and an
//! optional destructor, which runs exactly once when the last [`Ref`] goes away.
//!
//! The count is the only piece of object state that is safe to touch without
//! holding some other lock. Registries that must not keep an object alive hold a
//! [`WeakRef`] instead; upgrading one never brings a dead object back.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Atomic reference count.
#[derive(Debug)]
pub struct RefCount {
    count: AtomicUsize,
}

impl RefCount {
    /// A new count starts out owned by its creator.
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    /// Increments the count. The caller must already own a reference.
    /// Returns the previous value.
    #[inline]
    pub fn acquire(&self) -> usize {
        self.count.fetch_add(1, Ordering::Relaxed)
    }

    /// Increments the count unless it already reached zero.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.count
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| {
                (n != 0).then_some(n + 1)
            })
            .is_ok()
    }

    /// Decrements the count. Returns `true` if this dropped the last reference.
    #[inline]
    #[must_use]
    pub fn release(&self) -> bool {
        let prev = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(prev != 0, "refcount released below zero");
        if prev == 1 {
            // Pairs with the Release above on other threads so the destructor
            // sees every write made before their final release.
            fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs when the reference count of an object reaches zero.
pub type Destructor<T> = fn(&T);

struct RefBox<T> {
    refcount: RefCount,
    destructor: Option<Destructor<T>>,
    value: T,
}

/// An owned reference to a reference-counted object.
///
/// Cloning acquires a new reference; dropping releases one.
pub struct Ref<T> {
    inner: Arc<RefBox<T>>,
}

impl<T> Ref<T> {
    /// Allocates a new object with a refcount of 1 and no destructor.
    pub fn alloc(value: T) -> Self {
        Self::alloc_inner(value, None)
    }

    /// Allocates a new object with a refcount of 1. `destructor` runs once the
    /// last reference is released, before the storage is freed.
    pub fn alloc_with_destructor(value: T, destructor: Destructor<T>) -> Self {
        Self::alloc_inner(value, Some(destructor))
    }

    fn alloc_inner(value: T, destructor: Option<Destructor<T>>) -> Self {
        Self {
            inner: Arc::new(RefBox {
                refcount: RefCount::new(),
                destructor,
                value,
            }),
        }
    }

    /// Takes another reference to the same object.
    pub fn acquire(this: &Self) -> Self {
        this.inner.refcount.acquire();
        Self {
            inner: Arc::clone(&this.inner),
        }
    }

    /// Gives up this reference. Same as dropping it, but reads better at call
    /// sites that mirror an explicit acquire.
    pub fn release(this: Self) {
        drop(this);
    }

    /// Current number of references. Only a snapshot.
    pub fn refcount(this: &Self) -> usize {
        this.inner.refcount.get()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn downgrade(this: &Self) -> WeakRef<T> {
        WeakRef {
            inner: Arc::downgrade(&this.inner),
        }
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Ref::acquire(self)
    }
}

impl<T> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T> Drop for Ref<T> {
    fn drop(&mut self) {
        if self.inner.refcount.release() {
            if let Some(destructor) = self.inner.destructor {
                destructor(&self.inner.value);
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("refcount", &self.inner.refcount.get())
            .field("value", &self.inner.value)
            .finish()
    }
}

/// A non-owning reference. Does not keep the object alive.
pub struct WeakRef<T> {
    inner: Weak<RefBox<T>>,
}

impl<T> WeakRef<T> {
    /// Takes a new reference if the object still has at least one.
    pub fn upgrade(&self) -> Option<Ref<T>> {
        let inner = self.inner.upgrade()?;
        if inner.refcount.try_acquire() {
            Some(Ref { inner })
        } else {
            None
        }
    }

    /// True once the count has reached zero.
    pub fn is_dead(&self) -> bool {
        self.inner
            .upgrade()
            .map_or(true, |inner| inner.refcount.get() == 0)
    }

    pub fn points_to(&self, other: &Ref<T>) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&other.inner))
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    struct Tracked(u32);

    fn count_destroy(_: &Tracked) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn it_should_track_the_count_across_acquire_and_release() {
        let a = Ref::alloc(5u32);
        assert_eq!(Ref::refcount(&a), 1);
        let b = Ref::acquire(&a);
        assert_eq!(Ref::refcount(&a), 2);
        assert!(Ref::ptr_eq(&a, &b));
        Ref::release(b);
        assert_eq!(Ref::refcount(&a), 1);
        assert_eq!(*a, 5);
    }

    #[test]
    fn it_should_run_the_destructor_once_at_zero_across_threads() {
        let before = DESTROYED.load(Ordering::SeqCst);
        let obj = Ref::alloc_with_destructor(Tracked(7), count_destroy);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Ref::acquire(&obj);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let extra = r.clone();
                        assert_eq!(extra.0, 7);
                        drop(extra);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(DESTROYED.load(Ordering::SeqCst), before);
        drop(obj);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn it_should_refuse_weak_upgrades_after_the_last_release() {
        let strong = Ref::alloc(1u8);
        let weak = Ref::downgrade(&strong);
        assert!(weak.points_to(&strong));

        let upgraded = weak.upgrade().expect("object is still alive");
        assert_eq!(Ref::refcount(&strong), 2);
        drop(upgraded);
        drop(strong);

        assert!(weak.is_dead());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn it_should_refuse_try_acquire_at_zero() {
        let count = RefCount::new();
        assert!(count.release());
        assert!(!count.try_acquire());
        assert_eq!(count.get(), 0);
    }
}
