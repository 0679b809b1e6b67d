//! Boot synchronization protocol.
//!
//! [`BootContext`] owns the only shared mutable state of the boot sequence:
//! the lock protecting the console and the check-in counter. It is created
//! once, usually as a `static`, and passed by reference to every core.
//!
//! Memory ordering:
//!
//! - [`BootContext::init_lock`] publishes the lock with a release store that
//!   pairs with the acquire load performed by every acquisition.
//! - The check-in counter is only incremented while the lock is held, so the
//!   increments are totally ordered. Each one is a release operation.
//! - The primary core reads the counter without the lock, with acquire
//!   loads, until it observes every check-in.

use core::hint;
use core::sync::atomic::{AtomicUsize, Ordering};

use mutex::{BootLock, TicketMutexGuard};

use crate::console::{Console, CHECKIN_MESSAGE};
use crate::cpu::Role;
use crate::platform::Platform;
use crate::{Result, EXIT_CONSOLE, EXIT_LOCK_INIT};

/// Number of cores that have completed the entry routine.
struct Checkins(AtomicUsize);

impl Checkins {
    const fn new() -> Checkins {
        Checkins(AtomicUsize::new(0))
    }

    /// Records one check-in. `_held` proves that the caller holds the shared
    /// lock.
    fn record<C>(&self, _held: &TicketMutexGuard<'_, C>) {
        self.0.fetch_add(1, Ordering::Release);
    }

    fn load(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Process-wide state shared by all the cores during boot.
pub struct BootContext<C> {
    /// Shared lock. When held, it grants exclusive access to the console and
    /// the right to check in.
    console: BootLock<C>,

    /// Check-in counter.
    checkins: Checkins,
}

impl<C: Console> BootContext<C> {
    /// Returns a new [`BootContext`] around `console`. The shared lock is not
    /// usable until [`BootContext::init_lock`] is called.
    pub const fn new(console: C) -> BootContext<C> {
        BootContext {
            console: BootLock::new(console),
            checkins: Checkins::new(),
        }
    }

    /// Initializes the shared lock and publishes it with release semantics.
    ///
    /// It must run on a single core before any core calls
    /// [`BootContext::checkin`].
    pub fn init_lock(&self) -> Result<()> {
        self.console.init()?;
        Ok(())
    }

    /// Initializes the shared lock. On failure, reports a diagnostic through
    /// `platform` and terminates the program with [`EXIT_LOCK_INIT`].
    pub fn bring_up<P: Platform>(&self, platform: &P) {
        if let Err(err) = self.init_lock() {
            platform.diagnostic(format_args!("{err}"));
            platform.terminate(EXIT_LOCK_INIT);
        }
    }

    /// Per-core entry routine. It must run exactly once on every core.
    ///
    /// It writes [`CHECKIN_MESSAGE`] to the console, flushes it and checks
    /// in, all while holding the shared lock. It returns 0 on success or
    /// [`EXIT_CONSOLE`] if the console failed.
    pub fn checkin(&self) -> i32 {
        self.checkin_with(|console| {
            match writeln!(console, "{CHECKIN_MESSAGE}").and_then(|_| console.flush()) {
                Ok(()) => 0,
                Err(_) => EXIT_CONSOLE,
            }
        })
    }

    /// Same as [`BootContext::checkin`], but runs `work` as the protected
    /// work instead of writing the default message. It returns the status
    /// returned by `work`.
    pub fn checkin_with<F>(&self, work: F) -> i32
    where
        F: FnOnce(&mut C) -> i32,
    {
        let mut console = self.console.lock();
        let rc = work(&mut *console);
        self.checkins.record(&console);
        drop(console);
        rc
    }

    /// Returns the number of cores that have checked in so far. It does not
    /// take the lock, so the value may be stale.
    pub fn checkins(&self) -> usize {
        self.checkins.load()
    }

    /// Rendezvous of all the cores, called after
    /// [`BootContext::checkin`] with its status `rc`.
    ///
    /// The primary core spins until every core has checked in and returns
    /// `rc`. There is no timeout: if a core never checks in, the primary core
    /// spins forever. Secondary cores never return, see [`halt`].
    pub fn rendezvous<P: Platform>(&self, platform: &P, rc: i32) -> i32 {
        match platform.core().role() {
            Role::Primary => {
                let total = platform.num_cores();
                while self.checkins() != total {
                    hint::spin_loop();
                }
                rc
            }
            Role::Secondary => halt(platform),
        }
    }

    /// Runs the entry routine and the rendezvous on the calling core. Only
    /// the primary core returns.
    pub fn hart_main<P: Platform>(&self, platform: &P) -> i32 {
        let rc = self.checkin();
        self.rendezvous(platform, rc)
    }

    /// Same as [`BootContext::hart_main`], but with `work` as the protected
    /// work of the entry routine.
    pub fn hart_main_with<P, F>(&self, platform: &P, work: F) -> i32
    where
        P: Platform,
        F: FnOnce(&mut C) -> i32,
    {
        let rc = self.checkin_with(work);
        self.rendezvous(platform, rc)
    }
}

/// Parks the calling core forever. Interrupts may wake it up, but it goes
/// back to sleep immediately.
pub fn halt<P: Platform>(platform: &P) -> ! {
    loop {
        platform.wait_for_interrupt();
    }
}
