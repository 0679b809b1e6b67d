//! Shared console.

use core::fmt;

/// Message written by every core when it checks in.
pub const CHECKIN_MESSAGE: &str = "hello world";

/// A text output device shared by all the cores.
///
/// Output may be buffered by the implementation. [`Console::flush`] must not
/// return until everything written so far has left the buffer.
pub trait Console: fmt::Write {
    /// Flushes the pending output.
    fn flush(&mut self) -> fmt::Result;
}

