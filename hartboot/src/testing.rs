//! Test doubles that simulate cores with host threads.

extern crate std;

use core::fmt;

use std::string::String;
use std::sync::{Arc, Mutex};
use std::thread;
use std::vec::Vec;

use crate::console::Console;
use crate::cpu::Core;
use crate::platform::Platform;

/// Console that records every byte into a buffer shared with the test.
///
/// Bytes are pushed one at a time, yielding in between, so unprotected
/// concurrent writers would interleave.
pub struct RecordingConsole {
    out: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

/// Test side of a [`RecordingConsole`].
#[derive(Clone)]
pub struct Output {
    out: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

impl RecordingConsole {
    pub fn new() -> (RecordingConsole, Output) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let flushes = Arc::new(Mutex::new(0));
        let console = RecordingConsole {
            out: Arc::clone(&out),
            flushes: Arc::clone(&flushes),
        };
        (console, Output { out, flushes })
    }
}

impl fmt::Write for RecordingConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.out.lock().unwrap().push(b);
            thread::yield_now();
        }
        Ok(())
    }
}

impl Console for RecordingConsole {
    fn flush(&mut self) -> fmt::Result {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }
}

impl Output {
    pub fn text(&self) -> String {
        String::from_utf8(self.out.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(String::from).collect()
    }

    pub fn flushes(&self) -> usize {
        *self.flushes.lock().unwrap()
    }
}

/// Console whose writes always fail.
pub struct BrokenConsole;

impl fmt::Write for BrokenConsole {
    fn write_str(&mut self, _s: &str) -> fmt::Result {
        Err(fmt::Error)
    }
}

impl Console for BrokenConsole {
    fn flush(&mut self) -> fmt::Result {
        Err(fmt::Error)
    }
}

/// Payload of the panic used to emulate program termination.
#[derive(Debug)]
pub struct Terminated(pub i32);

/// A simulated board with a fixed number of cores.
pub struct Board {
    ncores: usize,
    halted: Mutex<Vec<usize>>,
    diagnostics: Mutex<Vec<String>>,
    exit_code: Mutex<Option<i32>>,
}

impl Board {
    pub fn new(ncores: usize) -> Arc<Board> {
        Arc::new(Board {
            ncores,
            halted: Mutex::new(Vec::new()),
            diagnostics: Mutex::new(Vec::new()),
            exit_code: Mutex::new(None),
        })
    }

    pub fn core(self: &Arc<Board>, id: usize) -> SimCore {
        SimCore {
            id,
            board: Arc::clone(self),
        }
    }

    /// Returns the sorted list of cores that reached the halt state.
    pub fn halted(&self) -> Vec<usize> {
        let mut halted = self.halted.lock().unwrap().clone();
        halted.sort_unstable();
        halted
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().unwrap().clone()
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().unwrap()
    }
}

/// The view of a [`Board`] from one of its cores.
pub struct SimCore {
    id: usize,
    board: Arc<Board>,
}

impl Platform for SimCore {
    fn core(&self) -> Core {
        Core::from(self.id)
    }

    fn num_cores(&self) -> usize {
        self.board.ncores
    }

    fn wait_for_interrupt(&self) {
        {
            let mut halted = self.board.halted.lock().unwrap();
            if !halted.contains(&self.id) {
                halted.push(self.id);
            }
        }
        thread::park();
    }

    fn diagnostic(&self, args: fmt::Arguments) {
        self.board
            .diagnostics
            .lock()
            .unwrap()
            .push(std::format!("{args}"));
    }

    fn terminate(&self, code: i32) -> ! {
        *self.board.exit_code.lock().unwrap() = Some(code);
        std::panic::panic_any(Terminated(code))
    }
}

/// Polls `cond` until it holds. Gives up after a few seconds so a broken
/// protocol fails the test instead of hanging it.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("condition not reached");
}
