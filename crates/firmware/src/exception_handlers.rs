//! Cortex-M exception and interrupt handlers.
//!
//! - **SysTick**: advances the 1 ms tick counter.
//! - **DefaultHandler**: every device interrupt lands here (the vector
//!   table is the cortex-m-rt default); the console's line is dispatched
//!   to its [`SerialIrq`], anything else is ignored.
//! - **HardFault**: reports the stacked frame over defmt and halts.

#![allow(clippy::doc_markdown)] // Exception handler docs use hardware terminology (HardFault, SVC) as plain text

use cortex_m_rt::{exception, ExceptionFrame};
use firmware::{IrqSlot, CONSOLE_QUEUE};
use platform::mmio::Mmio;
use platform::serial::SerialIrq;

/// Interrupt half of the console, installed by `Console::start`.
pub static CONSOLE_IRQ: IrqSlot<SerialIrq<'static, Mmio, CONSOLE_QUEUE>> = IrqSlot::new();

#[exception]
fn SysTick() {
    platform::tick::on_tick();
}

/// `irqn` is the device interrupt number; negative values are core
/// exceptions without a dedicated handler.
#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    let Ok(irq) = u8::try_from(irqn) else {
        return;
    };
    CONSOLE_IRQ.with(|console| {
        if console.irq() == Some(irq) {
            console.on_interrupt();
        }
    });
}

/// HardFault exception handler.
///
/// # Safety
///
/// This function must never return: returning from a HardFault handler is
/// undefined behavior on Cortex-M. The `-> !` return type enforces this.
#[exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &ExceptionFrame) -> ! {
    defmt::panic!(
        "HardFault! pc={=u32:#010x} lr={=u32:#010x} xpsr={=u32:#010x}",
        ef.pc(),
        ef.lr(),
        ef.xpsr()
    );
}
