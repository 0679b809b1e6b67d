//! Every core says hello once. Core 0 waits for the rest of the cores and
//! reports the exit status.

#![no_std]
#![no_main]

use core::fmt::Write;

use hartboot::console::CHECKIN_MESSAGE;
use hartboot::cpu::mp;
use hartboot::uart::Pl011;
use hartboot::Console;
use hartboot_macros::entrypoint_mp;

/// Protected work run once per core.
#[entrypoint_mp]
fn hello(console: &mut Pl011) -> i32 {
    let res = writeln!(console, "{CHECKIN_MESSAGE} from {}", mp::core_id())
        .and_then(|_| console.flush());

    match res {
        Ok(()) => 0,
        Err(_) => hartboot::EXIT_CONSOLE,
    }
}
