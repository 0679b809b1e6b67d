//! Board support for the Raspberry Pi 3 Model B.

use core::fmt;

use crate::cpu::{self, mp, Core};
use crate::platform::Platform;
use crate::println;

/// [`Platform`] implementation for the Raspberry Pi 3 Model B.
///
/// The four cores run the entry routine. There is nothing to return to, so
/// terminating the program reports the exit status on the UART and parks
/// the calling core. The secondary cores are either parked already or were
/// never released.
pub struct Rpi3;

impl Platform for Rpi3 {
    fn core(&self) -> Core {
        mp::core_id()
    }

    fn num_cores(&self) -> usize {
        mp::NCORES
    }

    fn wait_for_interrupt(&self) {
        cpu::wfi();
    }

    fn diagnostic(&self, args: fmt::Arguments) {
        println!("{}", args);
    }

    fn terminate(&self, code: i32) -> ! {
        println!("exit status: {}", code);
        loop {
            cpu::wfe();
        }
    }
}
