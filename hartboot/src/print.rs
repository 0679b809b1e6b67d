//! Unlocked output for the panic handler and fatal diagnostics.
//!
//! Nothing here takes the shared lock, so lines from different cores may
//! interleave. Regular output goes through
//! [`BootContext::checkin_with`](crate::BootContext::checkin_with).

use core::fmt::{self, Write};

use crate::uart::{self, Pl011};

/// Writes `args` to the UART and waits until it has been transmitted, so the
/// text is not lost if the core parks right after.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let _ = Pl011.write_fmt(args);
    uart::drain();
}

/// Print to the UART without taking the shared lock.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print::_print(core::format_args!($($arg)*))
    };
}

/// Print to the UART without taking the shared lock, with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };

    ($($arg:tt)*) => {
        $crate::print::_print(core::format_args!("{}\n", core::format_args!($($arg)*)))
    };
}
