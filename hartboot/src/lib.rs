//! hartboot synchronizes the boot of a multicore bare-metal system.
//!
//! Every core runs a shared entry routine exactly once. The routine writes to
//! a console protected by a process-wide lock and checks in by incrementing a
//! shared counter. Core 0 then waits until every core has checked in and
//! returns the final status, while the rest of the cores park forever in a
//! low-power state.
//!
//! The boot sequence is:
//!
//! 1. [`BootContext::bring_up`] runs once on core 0 before the other cores
//!    are released. It initializes the shared lock and publishes it with
//!    release semantics. If that fails, the program is terminated.
//! 2. Every core runs [`BootContext::hart_main`], which checks in
//!    ([`BootContext::checkin`]) and then meets the rest of the cores at the
//!    rendezvous ([`BootContext::rendezvous`]).
//!
//! The platform specific parts (core topology, low-power wait, diagnostics
//! and program termination) are provided through the [`Platform`] trait. The
//! shared console implements [`Console`].
//!
//! When built for `aarch64` bare metal, the crate also provides a PL011
//! console and a [`Platform`] implementation for the Raspberry Pi 3 Model B
//! in [`bsp`].

#![no_std]

use core::fmt;

pub mod boot;
pub mod console;
pub mod cpu;
pub mod platform;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod bsp;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod print;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod uart;

#[cfg(test)]
mod testing;

pub use boot::BootContext;
pub use console::Console;
pub use platform::Platform;

/// Exit status reported when the shared lock cannot be initialized.
pub const EXIT_LOCK_INIT: i32 = 1;

/// Exit status returned by the entry routine when the console fails.
pub const EXIT_CONSOLE: i32 = 2;

/// hartboot error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The shared lock could not be initialized.
    LockInit(mutex::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::LockInit(err) => {
                write!(f, "failed to initialize the shared lock: {err}")
            }
        }
    }
}

impl From<mutex::Error> for Error {
    fn from(err: mutex::Error) -> Error {
        Error::LockInit(err)
    }
}

/// hartboot result.
pub type Result<T> = core::result::Result<T, Error>;
