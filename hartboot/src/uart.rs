//! PL011 UART console.
//!
//! The UART is expected to be configured by the firmware (`enable_uart=1`
//! in `config.txt`, or QEMU). Only transmission is supported.
//!
//! For more information, please see:
//!
//! - [BCM2835 ARM Peripherals specification].
//! - [PL011 Technical Reference Manual].
//!
//! [BCM2835 ARM Peripherals specification]: https://datasheets.raspberrypi.com/bcm2835/bcm2835-peripherals.pdf
//! [PL011 Technical Reference Manual]: https://static6.arrow.com/aropdfconversion/32f6a7175ece91477c63bc40811c02e077718861/ddi0183.pdf

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

use crate::console::Console;

/// Address of the PL011 UART as seen by the ARM cores.
///
/// [/arch/arm/boot/dts/bcm283x.dtsi] places `uart0` at bus address
/// `0x7e201000`, which the BCM2837 maps to `0x3f201000`.
///
/// [/arch/arm/boot/dts/bcm283x.dtsi]: https://github.com/raspberrypi/linux/blob/770d94882ac145c81af72e9a37180806c3f70bbd/arch/arm/boot/dts/bcm283x.dtsi
const UART_BASE: usize = 0x3f201000;

/// PL011 registers used by the console.
#[derive(Copy, Clone)]
enum Reg {
    /// Data register.
    Dr = 0x00,

    /// Flag register.
    Fr = 0x18,
}

impl Reg {
    fn read(self) -> u32 {
        unsafe { read_volatile((UART_BASE + self as usize) as *const u32) }
    }

    fn write(self, val: u32) {
        unsafe { write_volatile((UART_BASE + self as usize) as *mut u32, val) }
    }
}

/// UART busy transmitting data.
const FR_BUSY: u32 = 1 << 3;

/// Transmit FIFO full.
const FR_TXFF: u32 = 1 << 5;

/// Transmits a byte, waiting for room in the transmit FIFO.
pub fn send_byte(b: u8) {
    while Reg::Fr.read() & FR_TXFF != 0 {}
    Reg::Dr.write(b as u32);
}

/// Waits until every byte in the transmit FIFO has been sent.
pub fn drain() {
    while Reg::Fr.read() & FR_BUSY != 0 {}
}

/// The PL011 UART as a [`Console`]. `\n` is translated into `\r\n`.
pub struct Pl011;

impl fmt::Write for Pl011 {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                send_byte(b'\r');
            }
            send_byte(b);
        }

        Ok(())
    }
}

impl Console for Pl011 {
    fn flush(&mut self) -> fmt::Result {
        drain();
        Ok(())
    }
}
