//! MSX1 emulator implementation
//!
//! # Architecture
//!
//! - **CPU**: Zilog Z80A @ 3.58 MHz, supplied by the host through
//!   [`emu_core::cpu_z80::Z80Cpu`]
//! - **VDP**: Texas Instruments TMS9918A, 16 KB VRAM
//! - **PSG**: General Instrument AY-3-8910 (or any
//!   [`emu_core::apu::SoundDevice`])
//! - **PPI**: i8255, keyboard matrix and primary slot select
//! - **Memory**: 4 primary slots of 64 KB, 8 KB blocks, 8-64 KB RAM in slot 3
//!
//! # Cartridges
//!
//! Plain 16/32 KB ROMs and the ASCII8, ASCII16 (both with optional 8 KB
//! SRAM) and Konami megaROM mappers are supported. See [`RomType`].
//!
//! # Snapshots
//!
//! [`Msx1::quick_save`] writes a chunked snapshot (`BRD`, `Z80`, `MMU`,
//! `RAM`, `SRM`, `PSG`, `VDP`). ROM images are never included.

pub mod bus;
pub mod clock;
pub mod config;
pub mod keyboard;
pub mod mapper;
pub mod mmu;
pub mod ports;
pub mod snapshot;
pub mod system;
pub mod vdp;

pub use bus::MsxBus;
pub use config::MsxConfig;
pub use keyboard::{JOY_S1, JOY_S2};
pub use mapper::RomType;
pub use system::{Msx1, MsxError};
pub use vdp::Vdp;
