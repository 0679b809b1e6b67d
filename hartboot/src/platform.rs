//! Platform services required by the boot protocol.

use core::fmt;

use crate::cpu::Core;

/// Services provided by the platform to the boot protocol.
///
/// The core topology must be stable for the whole life of the program.
pub trait Platform {
    /// Returns the core executing the caller.
    fn core(&self) -> Core;

    /// Returns the total number of cores that run the entry routine.
    fn num_cores(&self) -> usize;

    /// Enters a low-power state until an interrupt arrives. It may return
    /// spuriously.
    fn wait_for_interrupt(&self);

    /// Writes `args` as a diagnostic line without taking the shared lock. It
    /// is only used on the fatal path, when the shared lock is not usable.
    fn diagnostic(&self, args: fmt::Arguments);

    /// Terminates the whole program with the exit status `code`.
    fn terminate(&self, code: i32) -> !;
}
