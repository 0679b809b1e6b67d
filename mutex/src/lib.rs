//! Mutual exclusion primitives useful for protecting shared data during boot.
//!
//! The algorithms used under the hood have been taken from the paper
//! [Algorithms for Scalable Synchronization on Shared Memory
//! Multiprocessors][1].
//!
//! [1]: https://web.mit.edu/6.173/www/currentsemester/readings/R06-scalable-synchronization-1991.pdf

#![no_std]

use core::cell::UnsafeCell;
use core::fmt;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Mutex error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The lock has already been published by a previous call to
    /// [`BootLock::init`].
    AlreadyInitialized,

    /// Another core is in the middle of initializing the lock.
    InitInProgress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::AlreadyInitialized => {
                write!(f, "lock is already initialized")
            }
            Error::InitInProgress => {
                write!(f, "lock initialization is in progress")
            }
        }
    }
}

/// A mutex based on a ticket lock.
///
/// This type of spin lock ensures FIFO service by granting the lock to
/// processors in the same order in which they first requested it. A ticket
/// lock is fair in a strong sense; it eliminates the possibility of
/// starvation.
pub struct TicketMutex<T> {
    /// Number of requests to adquire the lock.
    next_ticket: AtomicUsize,

    /// Number of times the lock has been released.
    now_serving: AtomicUsize,

    /// Protected data.
    data: UnsafeCell<T>,
}

/// An RAII implementation of a "scoped lock" on a mutex. When this structure
/// is dropped, the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via its
/// [`Deref`] and [`DerefMut`] implementations.
///
/// This structure is created by the [`TicketMutex::lock`] method.
pub struct TicketMutexGuard<'a, T> {
    /// The mutex that created this [`TicketMutexGuard`] on lock.
    mutex: &'a TicketMutex<T>,
}

impl<T> TicketMutex<T> {
    /// Returns a new [`TicketMutex`] protecting `data`.
    pub const fn new(data: T) -> TicketMutex<T> {
        TicketMutex {
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Locks the mutex and returns a [`TicketMutexGuard`] that grants
    /// exclusive access to the protected data until it is dropped.
    pub fn lock(&self) -> TicketMutexGuard<'_, T> {
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while my_ticket != self.now_serving.load(Ordering::Acquire) {
            hint::spin_loop()
        }
        TicketMutexGuard { mutex: self }
    }

    /// Locks the mutex only if nobody holds or waits for it. Returns `None`
    /// otherwise.
    pub fn try_lock(&self) -> Option<TicketMutexGuard<'_, T>> {
        // Pairs with the release in the previous holder's guard drop.
        let serving = self.now_serving.load(Ordering::Acquire);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .ok()
            .map(|_| TicketMutexGuard { mutex: self })
    }

    /// Returns a mutable reference to the protected data. No locking is
    /// needed because `&mut self` proves exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

unsafe impl<T: Send> Send for TicketMutex<T> {}
unsafe impl<T: Send> Sync for TicketMutex<T> {}

impl<T> Deref for TicketMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for TicketMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for TicketMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.now_serving.fetch_add(1, Ordering::Release);
    }
}

/// The lock has not been initialized yet.
const UNINIT: u8 = 0;

/// A core is initializing the lock.
const INITIALIZING: u8 = 1;

/// The lock has been published and can be acquired.
const READY: u8 = 2;

/// A [`TicketMutex`] that must be explicitly published by exactly one core
/// before it is shared.
///
/// Boot code usually initializes its locks on the boot core while the other
/// cores are still parked, and there is no other synchronization between
/// that initialization and the first acquisition on a different core.
/// [`BootLock::init`] finishes with a release store of the lock state and
/// [`BootLock::lock`] starts with an acquire load of it, so every core that
/// takes the lock observes it fully initialized.
pub struct BootLock<T> {
    /// Initialization state: `UNINIT`, `INITIALIZING` or `READY`.
    state: AtomicU8,

    /// Underlying ticket lock.
    mutex: TicketMutex<T>,
}

impl<T> BootLock<T> {
    /// Returns a new uninitialized [`BootLock`] protecting `data`.
    pub const fn new(data: T) -> BootLock<T> {
        BootLock {
            state: AtomicU8::new(UNINIT),
            mutex: TicketMutex::new(data),
        }
    }

    /// Initializes the lock and publishes it to the rest of the cores.
    ///
    /// It must be called once, on one core, before any core calls
    /// [`BootLock::lock`].
    pub fn init(&self) -> Result<(), Error> {
        if let Err(state) = self.state.compare_exchange(
            UNINIT,
            INITIALIZING,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            return match state {
                INITIALIZING => Err(Error::InitInProgress),
                _ => Err(Error::AlreadyInitialized),
            };
        }

        self.mutex.next_ticket.store(0, Ordering::Relaxed);
        self.mutex.now_serving.store(0, Ordering::Relaxed);

        // Release semantics: every write above happens before any core
        // observes READY.
        self.state.store(READY, Ordering::Release);
        Ok(())
    }

    /// Returns whether the lock has been published.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Locks the mutex, spinning until the lock has been initialized and
    /// then until it is available.
    pub fn lock(&self) -> TicketMutexGuard<'_, T> {
        while !self.is_initialized() {
            hint::spin_loop()
        }
        self.mutex.lock()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn mutex_lock() {
        let mutex = TicketMutex::new(0);

        let mut x = mutex.lock();
        *x += 1;
        drop(x);

        let mut x = mutex.lock();
        *x += 1;
        drop(x);

        let x = mutex.lock();
        assert_eq!(*x, 2);
    }

    #[test]
    fn mutex_try_lock() {
        let mutex = TicketMutex::new(0);

        let x = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(x);

        let mut x = mutex.try_lock().expect("lock should be free");
        *x += 1;
        drop(x);

        assert_eq!(*mutex.lock(), 1);
    }

    #[test]
    fn mutex_get_mut() {
        let mut mutex = TicketMutex::new(41);
        *mutex.get_mut() += 1;
        assert_eq!(*mutex.lock(), 42);
    }

    #[test]
    fn mutex_contended() {
        const THREADS: usize = 4;
        const ITERS: usize = 200;

        let mutex = Arc::new(TicketMutex::new(0usize));

        let handles = (0..THREADS)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        *mutex.lock() += 1;
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(*mutex.lock(), THREADS * ITERS);
    }

    #[test]
    fn boot_lock_init() {
        let lock = BootLock::new(0);
        assert!(!lock.is_initialized());

        lock.init().expect("first init must succeed");
        assert!(lock.is_initialized());

        *lock.lock() += 1;
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn boot_lock_init_twice() {
        let lock = BootLock::new(());
        lock.init().expect("first init must succeed");
        assert_eq!(lock.init(), Err(Error::AlreadyInitialized));
        assert!(lock.is_initialized());
    }

    #[test]
    fn boot_lock_init_in_progress() {
        let lock = BootLock::new(());
        lock.state.store(INITIALIZING, Ordering::Relaxed);

        assert_eq!(lock.init(), Err(Error::InitInProgress));
        assert!(!lock.is_initialized());
    }

    #[test]
    fn mutex_try_lock_handoff() {
        let mutex = Arc::new(TicketMutex::new(Vec::new()));

        let producer = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || mutex.lock().push(1))
        };

        let consumer = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || loop {
                if let Some(mut data) = mutex.try_lock() {
                    if !data.is_empty() {
                        data.push(2);
                        break;
                    }
                }
                thread::yield_now();
            })
        };

        producer.join().expect("producer panicked");
        consumer.join().expect("consumer panicked");

        assert_eq!(*mutex.lock(), [1, 2]);
    }

    #[test]
    fn boot_lock_waits_for_init() {
        let lock = Arc::new(BootLock::new(0));

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                *lock.lock() += 1;
            })
        };

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());

        lock.init().expect("init must succeed");
        waiter.join().expect("thread panicked");

        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            std::format!("{}", Error::AlreadyInitialized),
            "lock is already initialized"
        );
        assert_eq!(
            std::format!("{}", Error::InitInProgress),
            "lock initialization is in progress"
        );
    }
}
