use clap::ValueEnum;

/// Supported boards, one per chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Chip {
    /// STM32F103 ("blue pill")
    F1,
    /// STM32F303 Discovery
    F3,
    /// STM32F407 Discovery
    F4,
    /// STM32F746 Nucleo-144
    F7,
    /// STM32H743 Nucleo-144
    H7,
    /// STM32L053 Nucleo-64
    L0,
    /// STM32L432 Nucleo-32
    L4,
}

impl Chip {
    pub const ALL: [Chip; 7] = [
        Chip::F1,
        Chip::F3,
        Chip::F4,
        Chip::F7,
        Chip::H7,
        Chip::L0,
        Chip::L4,
    ];

    /// Firmware cargo feature selecting this chip.
    pub fn feature(self) -> &'static str {
        match self {
            Chip::F1 => "stm32f1",
            Chip::F3 => "stm32f3",
            Chip::F4 => "stm32f4",
            Chip::F7 => "stm32f7",
            Chip::H7 => "stm32h7",
            Chip::L0 => "stm32l0",
            Chip::L4 => "stm32l4",
        }
    }

    /// Rust target triple for the core.
    pub fn target(self) -> &'static str {
        match self {
            Chip::F1 => "thumbv7m-none-eabi",
            Chip::L0 => "thumbv6m-none-eabi",
            Chip::F3 | Chip::F4 | Chip::F7 | Chip::H7 | Chip::L4 => "thumbv7em-none-eabihf",
        }
    }

    /// probe-rs chip name.
    pub fn probe_name(self) -> &'static str {
        match self {
            Chip::F1 => "STM32F103C8",
            Chip::F3 => "STM32F303VCTx",
            Chip::F4 => "STM32F407VGTx",
            Chip::F7 => "STM32F746ZGTx",
            Chip::H7 => "STM32H743ZITx",
            Chip::L0 => "STM32L053R8Tx",
            Chip::L4 => "STM32L432KCUx",
        }
    }

    /// `hardware,<chip>` feature list for the firmware crate.
    pub fn firmware_features(self) -> String {
        format!("hardware,{}", self.feature())
    }

    /// Path of the built firmware ELF.
    pub fn binary_path(self, release: bool) -> String {
        let profile = if release { "release" } else { "debug" };
        format!("target/{}/{profile}/firmware", self.target())
    }
}
