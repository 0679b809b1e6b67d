//! Macros that generate the bare-metal startup code of hartboot programs.
//!
//! The generated code targets the Raspberry Pi 3 Model B running in EL2, as
//! booted by the official firmware with the armstub spin tables.

use proc_macro::TokenStream;

use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemFn, ReturnType};

/// Size of the stack allocated for each core.
const CORE_STACK_SIZE: usize = 64 * 1024;

/// Number of cores booted by the generated code.
const NCORES: usize = 4;

/// Boots the four cores and runs the provided function on each one of them as
/// the protected work of the entry routine.
///
/// The function must have the signature
/// `fn(&mut hartboot::uart::Pl011) -> i32`. It is called exactly once per
/// core while holding the shared lock, so it has exclusive access to the
/// console.
///
/// The generated code does the following:
///
/// 1. Core 0 starts at `_start` with a temporary stack and initializes the
///    shared lock. If initialization fails, the program is terminated.
/// 2. Core 0 writes the secondary entrypoint into the spin tables, issues a
///    `dsb` so the writes are visible, and wakes the rest of the cores with
///    `sev`.
/// 3. Every core, core 0 included, sets up its own stack, checks in and
///    joins the rendezvous. Core 0 terminates the program with the status
///    returned by its entry routine. The rest of the cores halt forever.
///
/// Under the hood it specifies that the entrypoint must be placed into a
/// section called `.entry`.
///
/// The Raspberry Pi 3 Model B expects the entrypoint of the kernel to be at
/// 0x80000. Therefore, we need the linker to place the section `.entry` at
/// this address.
///
/// The following example shows how to do this using a Cargo configuration
/// file.
///
/// ```text
/// [target.aarch64-unknown-none]
/// rustflags = [
///     "-Clink-arg=--image-base=0x80000",
///     "-Clink-arg=--section-start=.entry=0x80000",
/// ]
/// ```
#[proc_macro_attribute]
pub fn entrypoint_mp(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_fn = parse_macro_input!(item as ItemFn);
    expand_entrypoint_mp(item_fn).into()
}

/// Expands [`macro@entrypoint_mp`].
fn expand_entrypoint_mp(item_fn: ItemFn) -> TokenStream2 {
    if let Err(err) = check_signature(&item_fn) {
        return err.to_compile_error();
    }

    let fname_rust = &item_fn.sig.ident;
    let fname_work = format_ident!("_hartboot_work_{}", fname_rust);

    let start_mp_code = format!(
        r#"
                // Get core ID.
                mrs x5, mpidr_el1
                and x5, x5, #0xff

                // Set stack pointer to the top of this core's stack.
                ldr x1, =_HARTBOOT_STACKS
                ldr x2, ={CORE_STACK_SIZE:#x}
                add x5, x5, #1
                mul x5, x5, x2
                add x5, x1, x5
                mov sp, x5

                bl _hartboot_main

            1:
                b 1b
        "#,
    );

    let stacks_size = CORE_STACK_SIZE * NCORES;

    quote! {
        #[repr(C, align(16))]
        struct _HartbootStacks([u8; #stacks_size]);

        #[no_mangle]
        static mut _HARTBOOT_STACKS: _HartbootStacks = _HartbootStacks([0; #stacks_size]);

        // Kept out of .bss, which is not cleared before the context is used.
        #[link_section = ".data"]
        static _HARTBOOT_CONTEXT: hartboot::BootContext<hartboot::uart::Pl011> =
            hartboot::BootContext::new(hartboot::uart::Pl011);

        #[no_mangle]
        extern "C" fn _hartboot_bring_up() {
            _HARTBOOT_CONTEXT.bring_up(&hartboot::bsp::Rpi3);
        }

        #[no_mangle]
        extern "C" fn _hartboot_main() -> ! {
            let platform = hartboot::bsp::Rpi3;
            let rc = _HARTBOOT_CONTEXT.hart_main_with(&platform, #fname_work);
            hartboot::Platform::terminate(&platform, rc)
        }

        fn #fname_work(console: &mut hartboot::uart::Pl011) -> i32 {
            #fname_rust(console)
        }

        #[link_section = ".entry"]
        #[no_mangle]
        #[unsafe(naked)]
        unsafe extern "C" fn _start() -> ! {
            core::arch::naked_asm!(
                r#"
                    // Allocate an initial stack of approximately 0x80000 bytes
                    // for core 0. It is only used by `_hartboot_bring_up`.
                    ldr x5, =0x80000
                    mov sp, x5

                    // Initialize the shared lock.
                    bl _hartboot_bring_up

                    // All cores but core 0 are waiting for a wakeup event.
                    // Once the event is received, they jump to the address
                    // stored at 0xe0 (core 1), 0xe8 (core 2) and 0xf0 (core 3)
                    // if not zero. Implementation:
                    // https://github.com/raspberrypi/tools/blob/master/armstubs/armstub8.S
                    adr x5, _hartboot_start_mp
                    mov x6, #0xe0
                    str x5, [x6], #0x8
                    str x5, [x6], #0x8
                    str x5, [x6], #0x8

                    // The lock and the spin tables must be visible before the
                    // cores wake up.
                    dsb sy

                    sev

                    b _hartboot_start_mp
                "#
            )
        }

        #[no_mangle]
        #[unsafe(naked)]
        unsafe extern "C" fn _hartboot_start_mp() -> ! {
            core::arch::naked_asm!(#start_mp_code)
        }

        #[panic_handler]
        fn panic(info: &core::panic::PanicInfo) -> ! {
            hartboot::print!("\n\n!!! PANIC !!!\n\n");
            hartboot::println!("{}", info);

            loop {
                hartboot::cpu::wfe();
            }
        }

        #item_fn
    }
}

/// Checks that `item_fn` can be used as the protected work of the entry
/// routine.
fn check_signature(item_fn: &ItemFn) -> syn::Result<()> {
    let sig = &item_fn.sig;

    if sig.asyncness.is_some() || !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            sig,
            "entrypoint function cannot be async or generic",
        ));
    }

    if sig.inputs.len() != 1 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "entrypoint function must take exactly one argument: the console",
        ));
    }

    if let ReturnType::Default = sig.output {
        return Err(syn::Error::new_spanned(
            sig,
            "entrypoint function must return an i32 status",
        ));
    }

    Ok(())
}
