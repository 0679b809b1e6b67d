//! CPU specific operations.

#[cfg(any(target_arch = "aarch64", target_arch = "riscv32", target_arch = "riscv64"))]
use core::arch::asm;
use core::fmt;

#[cfg(target_arch = "aarch64")]
pub mod mp;

/// Represents a CPU core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Core(usize);

/// Role of a core during boot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Waits for every core to check in and reports the final status.
    Primary,

    /// Checks in and halts forever.
    Secondary,
}

impl Core {
    /// The primary core.
    pub const PRIMARY: Core = Core(0);

    /// Returns whether this is the primary core.
    pub fn is_primary(&self) -> bool {
        *self == Core::PRIMARY
    }

    /// Returns the boot role of the core.
    pub fn role(&self) -> Role {
        if self.is_primary() {
            Role::Primary
        } else {
            Role::Secondary
        }
    }
}

impl From<usize> for Core {
    fn from(core: usize) -> Core {
        Core(core)
    }
}

impl From<Core> for usize {
    fn from(core: Core) -> usize {
        core.0
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "core {}", self.0)
    }
}

/// wfe instruction.
///
/// Wait For Event is a hint instruction that indicates that the PE can enter a
/// low-power state and remain there until a wakeup event occurs.
#[inline(always)]
pub fn wfe() {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("wfe")
    };

    #[cfg(not(target_arch = "aarch64"))]
    core::hint::spin_loop();
}

/// wfi instruction.
///
/// Wait For Interrupt is a hint instruction that indicates that the PE can
/// enter a low-power state and remain there until an interrupt occurs. Hosts
/// without such an instruction just spin.
#[inline(always)]
pub fn wfi() {
    #[cfg(any(target_arch = "aarch64", target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        asm!("wfi")
    };

    #[cfg(not(any(
        target_arch = "aarch64",
        target_arch = "riscv32",
        target_arch = "riscv64"
    )))]
    core::hint::spin_loop();
}
