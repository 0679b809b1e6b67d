//! Multi-processing operations.

use core::arch::asm;

use super::Core;

/// Number of CPU cores of the Raspberry Pi 3 Model B.
pub const NCORES: usize = 4;

/// Returns the ID of the current core.
pub fn core_id() -> Core {
    let mut mpidr_el1: u64;
    unsafe { asm!("mrs {}, mpidr_el1", out(reg) mpidr_el1) };
    Core::from((mpidr_el1 & 0xff) as usize)
}
