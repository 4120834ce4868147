//! MSX1 machine
//!
//! [`Msx1`] owns the processor and the bus. The processor is any
//! [`Z80Cpu`]; each tick hands it the bus and lets it run until the VDP
//! signals the end of a frame.

use std::sync::Arc;

use emu_core::apu::{Ay8910, SoundDevice};
use emu_core::cpu_z80::{Z80Cpu, Z80Registers};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::renderer::Renderer;
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde_json::{json, Value};
use thiserror::Error;

use crate::bus::{MsxBus, SoundCallback, MAX_SOUND_SIZE};
use crate::config::MsxConfig;
use crate::mapper::RomType;
use crate::mmu::Mmu;
use crate::snapshot::{ChunkKind, ChunkReader, ChunkWriter};
use crate::vdp::{LineCallback, Vdp};

/// MSX emulator errors
#[derive(Debug, Error)]
pub enum MsxError {
    #[error("Invalid RAM size {0:#X} (expected 8KB, 16KB, 32KB or 64KB)")]
    InvalidRamSize(usize),
    #[error("Unknown ROM type {0}")]
    UnknownRomType(u8),
    #[error("Slot {slot} block {block} is out of range")]
    InvalidSlot { slot: usize, block: usize },
    #[error("Could not allocate the snapshot buffer")]
    SnapshotAllocation,
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
}

const MOUNT_CARTRIDGE: &str = "Cartridge";
const MOUNT_BIOS: &str = "BIOS";

/// MSX1 computer
pub struct Msx1<C: Z80Cpu> {
    cpu: C,
    bus: MsxBus,
    config: MsxConfig,
    bios_loaded: bool,
    last_input: (u8, u8, u8),
}

impl<C: Z80Cpu> Msx1<C> {
    /// Build a machine with the bundled AY-3-8910
    pub fn new(config: MsxConfig, cpu: C) -> Result<Self, MsxError> {
        let mut psg = Ay8910::new(config.psg_gain);
        psg.set_volume(config.psg_volume);
        Self::with_sound_device(config, cpu, Box::new(psg))
    }

    /// Build a machine around a host supplied sound device
    pub fn with_sound_device(
        config: MsxConfig,
        cpu: C,
        psg: Box<dyn SoundDevice>,
    ) -> Result<Self, MsxError> {
        let mmu = Mmu::new(config.ram_size)?;
        let vdp = Vdp::new(config.color_mode);
        let mut msx = Self {
            cpu,
            bus: MsxBus::new(mmu, vdp, psg),
            config,
            bios_loaded: false,
            last_input: (0, 0, 0),
        };
        msx.reset();
        Ok(msx)
    }

    pub fn config(&self) -> &MsxConfig {
        &self.config
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn bus(&self) -> &MsxBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MsxBus {
        &mut self.bus
    }

    /// Map a read-only image (e.g. the BIOS into slot 0 block 0)
    pub fn setup(
        &mut self,
        slot: usize,
        block: usize,
        data: &[u8],
        label: Option<&str>,
    ) -> Result<(), MsxError> {
        self.bus.mmu.setup(slot, block, Arc::from(data), label)
    }

    /// Insert a cartridge and reset
    pub fn load_rom(&mut self, data: &[u8], rom_type: RomType) -> Result<(), MsxError> {
        self.bus.mmu.setup_cartridge(Arc::from(data), rom_type)?;
        self.reset();
        Ok(())
    }

    /// Remove the cartridge and reset
    pub fn eject_rom(&mut self) {
        self.bus.mmu.clear_cartridge();
        self.reset();
    }

    /// Power-on state. Images, key bindings and callbacks survive.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_registers(Z80Registers::power_on());
        self.bus.reset();
        log(LogCategory::Cpu, LogLevel::Info, || "MSX1: reset".to_string());
    }

    /// Run one frame with joystick pads and a single held key (0 for none)
    pub fn tick(&mut self, pad1: u8, pad2: u8, key: u8) {
        self.last_input = (pad1, pad2, key);
        self.bus.set_input(pad1, pad2, key, None);
        self.cpu.execute(&mut self.bus);
    }

    /// Run one frame with a full keyboard row map instead of one key
    pub fn tick_with_keymap(&mut self, pad1: u8, pad2: u8, keymap: &[u8]) {
        self.last_input = (pad1, pad2, 0);
        self.bus.set_input(pad1, pad2, 0, Some(keymap));
        self.cpu.execute(&mut self.bus);
    }

    /// Bind a joystick select button to a key. Invalid players, buttons
    /// or keys are ignored.
    pub fn setup_key_assign(&mut self, player: usize, button: u8, key: u8) {
        if !self.bus.keyboard_mut().assign(player, button, key) {
            log(LogCategory::Bus, LogLevel::Debug, || {
                format!(
                    "MSX1: ignored key assign player {} button {:02X} key {:02X}",
                    player, button, key
                )
            });
        }
    }

    /// Samples produced since the last call
    pub fn take_sound(&mut self) -> &[i16] {
        self.bus.take_sound()
    }

    pub fn max_sound_size(&self) -> usize {
        MAX_SOUND_SIZE
    }

    pub fn set_sound_callback(&mut self, callback: Option<SoundCallback>) {
        self.bus.set_sound_callback(callback);
    }

    pub fn set_line_callback(&mut self, callback: Option<LineCallback>) {
        self.bus.vdp.set_line_callback(callback);
    }

    /// The 256x192 picture
    pub fn display(&self) -> &Frame {
        self.bus.vdp.get_frame()
    }

    pub fn backdrop_color(&self, swap: bool) -> u16 {
        self.bus.vdp.backdrop_color(swap)
    }

    /// Serialize the machine into a chunked snapshot
    pub fn quick_save(&mut self) -> Result<Vec<u8>, MsxError> {
        let board = self.bus.board_context();
        let cpu = self.cpu.registers().to_bytes();
        let mmu = self.bus.mmu.context().to_bytes();
        let psg = self.bus.psg().context();
        let vdp = self.bus.vdp.context().to_bytes();
        let ram = self.bus.mmu.ram();
        let sram = self.bus.mmu.sram();

        let mut lens = vec![
            board.len(),
            cpu.len(),
            mmu.len(),
            ram.len(),
            psg.len(),
            vdp.len(),
        ];
        if !sram.is_empty() {
            lens.push(sram.len());
        }

        let mut writer = ChunkWriter::with_payloads(&lens)?;
        writer.push(ChunkKind::Board, &board);
        writer.push(ChunkKind::Cpu, &cpu);
        writer.push(ChunkKind::Mmu, &mmu);
        writer.push(ChunkKind::Ram, ram);
        if !sram.is_empty() {
            writer.push(ChunkKind::Sram, sram);
        }
        writer.push(ChunkKind::Psg, &psg);
        writer.push(ChunkKind::Vdp, &vdp);
        let data = writer.finish();

        log(LogCategory::Snapshot, LogLevel::Debug, || {
            format!("SNAPSHOT: saved {} bytes", data.len())
        });
        Ok(data)
    }

    /// Reset, then apply chunks until the data ends or a chunk header is
    /// malformed. Returns the number of chunks applied.
    pub fn quick_load(&mut self, data: &[u8]) -> usize {
        self.reset();
        let mut applied = 0;
        for chunk in ChunkReader::new(data) {
            match chunk.kind {
                ChunkKind::Board => self.bus.set_board_context(chunk.payload),
                ChunkKind::Cpu => {
                    let mut regs = self.cpu.registers();
                    regs.load_bytes(chunk.payload);
                    self.cpu.set_registers(regs);
                }
                ChunkKind::Mmu => self.bus.mmu.set_context(chunk.payload),
                ChunkKind::Ram => self.bus.mmu.load_ram(chunk.payload),
                ChunkKind::Sram => self.bus.mmu.load_sram(chunk.payload),
                ChunkKind::Psg => self.bus.psg_mut().set_context(chunk.payload),
                ChunkKind::Vdp => self.bus.vdp.set_context(chunk.payload),
            }
            applied += 1;
        }
        log(LogCategory::Snapshot, LogLevel::Debug, || {
            format!("SNAPSHOT: restored {} chunks", applied)
        });
        applied
    }
}

impl<C: Z80Cpu> System for Msx1<C> {
    type Error = MsxError;

    fn reset(&mut self) {
        Msx1::reset(self);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        let (pad1, pad2, key) = self.last_input;
        self.tick(pad1, pad2, key);
        Ok(self.display().clone())
    }

    fn save_state(&mut self) -> Result<Vec<u8>, Self::Error> {
        self.quick_save()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.quick_load(data);
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn debug_state(&self) -> Value {
        let regs = self.cpu.registers();
        let mmu = self.bus.mmu();
        let vdp = self.bus.vdp().context();
        let board = self.bus.board();
        let blocks: Vec<Vec<&str>> = (0..4)
            .map(|slot| {
                (0..8)
                    .filter_map(|block| mmu.block(slot, block).map(|b| b.label()))
                    .collect()
            })
            .collect();

        json!({
            "cpu": {
                "pc": regs.pc,
                "sp": regs.sp,
                "af": u16::from_be_bytes([regs.a, regs.f]),
                "bc": u16::from_be_bytes([regs.b, regs.c]),
                "de": u16::from_be_bytes([regs.d, regs.e]),
                "hl": u16::from_be_bytes([regs.h, regs.l]),
                "ix": regs.ix,
                "iy": regs.iy,
                "iff1": regs.iff1,
                "im": regs.im,
                "halted": regs.halted,
            },
            "mmu": {
                "primary": mmu.primary(),
                "banks": mmu.context().banks,
                "sram_select": mmu.context().sram_select,
                "rom_type": mmu.rom_type().map(u8::from),
                "blocks": blocks,
            },
            "vdp": {
                "registers": vdp.reg,
                "status": vdp.stat,
                "address": vdp.addr,
                "count_h": vdp.count_h,
                "count_v": vdp.count_v,
                "frame": vdp.frame,
                "mode": format!("{:?}", self.bus.vdp().mode()),
            },
            "board": {
                "reg_c": board.reg_c,
                "selected_row": board.selected_row,
                "key": board.key,
                "read_key": board.read_key,
                "psg_latch": board.psg_latch,
            },
        })
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: MOUNT_CARTRIDGE.to_string(),
                name: "Cartridge Slot".to_string(),
                extensions: vec!["rom".to_string(), "mx1".to_string()],
                required: false,
            },
            MountPointInfo {
                id: MOUNT_BIOS.to_string(),
                name: "BIOS ROM".to_string(),
                extensions: vec!["rom".to_string(), "bin".to_string()],
                required: true,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        match mount_point_id {
            MOUNT_CARTRIDGE => {
                let rom_type = RomType::try_from(self.config.rom_type)?;
                self.load_rom(data, rom_type)
            }
            MOUNT_BIOS => {
                self.setup(0, 0, data, Some("MAIN"))?;
                self.bios_loaded = true;
                self.reset();
                Ok(())
            }
            other => Err(MsxError::InvalidMountPoint(other.to_string())),
        }
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            MOUNT_CARTRIDGE => {
                self.eject_rom();
                Ok(())
            }
            MOUNT_BIOS => {
                self.bus.mmu.clear_slot(0);
                self.bios_loaded = false;
                self.reset();
                Ok(())
            }
            other => Err(MsxError::InvalidMountPoint(other.to_string())),
        }
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        match mount_point_id {
            MOUNT_CARTRIDGE => self.bus.mmu().has_cartridge(),
            MOUNT_BIOS => self.bios_loaded,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BLANK_IRQ_VECTOR;
    use crate::clock::{CPU_CLOCK, VDP_CLOCK};
    use crate::keyboard::{JOY_S1, JOY_S2};
    use crate::mmu::MmuContext;
    use crate::snapshot::CHUNK_HEADER_LEN;
    use crate::vdp::{VdpContext, STEPS_PER_FRAME};
    use emu_core::cpu_z80::Z80Bus;
    use emu_core::graphics::ColorMode;
    use std::collections::VecDeque;

    /// Bus operation performed by [`ScriptedCpu`] before it starts burning
    /// cycles
    #[derive(Debug, Clone, Copy)]
    enum Op {
        Write(u16, u8),
        Out(u8, u8),
        In(u8),
        Read(u16),
    }

    /// Test processor: replays queued bus operations, then consumes clock
    /// in fixed steps until the bus reports a frame break.
    #[derive(Default)]
    struct ScriptedCpu {
        regs: Z80Registers,
        script: VecDeque<Op>,
        step: u32,
        values: Vec<u8>,
        irqs: Vec<u8>,
        cycles: u64,
        resets: usize,
    }

    impl ScriptedCpu {
        fn new(step: u32) -> Self {
            Self {
                step,
                ..Self::default()
            }
        }
    }

    impl Z80Cpu for ScriptedCpu {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn execute<B: Z80Bus>(&mut self, bus: &mut B) {
            while let Some(op) = self.script.pop_front() {
                match op {
                    Op::Write(addr, value) => bus.write(addr, value),
                    Op::Out(port, value) => bus.io_write(port as u16, value),
                    Op::In(port) => self.values.push(bus.io_read(port as u16)),
                    Op::Read(addr) => self.values.push(bus.read(addr)),
                }
            }
            for _ in 0..10_000_000 {
                let signals = bus.consume_clock(self.step);
                self.cycles += self.step as u64;
                if let Some(vector) = signals.irq {
                    self.irqs.push(vector);
                }
                if signals.frame_break {
                    return;
                }
            }
            panic!("no frame break");
        }

        fn registers(&self) -> Z80Registers {
            self.regs
        }

        fn set_registers(&mut self, regs: Z80Registers) {
            self.regs = regs;
        }
    }

    fn machine() -> Msx1<ScriptedCpu> {
        Msx1::new(MsxConfig::default(), ScriptedCpu::new(4)).unwrap()
    }

    fn script(msx: &mut Msx1<ScriptedCpu>, ops: &[Op]) {
        msx.cpu.script.extend(ops.iter().copied());
    }

    fn banked_rom(banks: usize) -> Vec<u8> {
        (0..banks * 0x2000).map(|i| (i / 0x2000) as u8).collect()
    }

    #[test]
    fn test_creation() {
        let msx = machine();
        assert_eq!(msx.cpu().resets, 1);
        assert_eq!(msx.cpu().regs, Z80Registers::power_on());
        assert_eq!(msx.bus().board().reg_c, 0x50);
        assert_eq!(msx.display().width, 256);
        assert_eq!(msx.display().height, 192);
        assert_eq!(msx.max_sound_size(), 4096);
        assert!(msx.supports_save_states());
    }

    #[test]
    fn test_invalid_ram_size() {
        let config = MsxConfig {
            ram_size: 12345,
            ..MsxConfig::default()
        };
        assert!(matches!(
            Msx1::new(config, ScriptedCpu::new(4)),
            Err(MsxError::InvalidRamSize(12345))
        ));
    }

    #[test]
    fn test_one_frame() {
        let mut msx = machine();
        script(&mut msx, &[Op::Out(0x99, 0x60), Op::Out(0x99, 0x81)]);
        msx.tick(0, 0, 0);

        assert_eq!(msx.bus().vdp().frame_count(), 1);
        assert_eq!(msx.cpu().irqs, vec![BLANK_IRQ_VECTOR]);
        let frame_cycles = (STEPS_PER_FRAME as u64 * CPU_CLOCK as u64).div_ceil(VDP_CLOCK as u64);
        assert!(msx.cpu().cycles <= frame_cycles + 4);
        assert!(msx.cpu().cycles + 8 >= frame_cycles);
    }

    #[test]
    fn test_no_irq_when_disabled() {
        let mut msx = machine();
        msx.tick(0, 0, 0);
        msx.tick(0, 0, 0);
        assert!(msx.cpu().irqs.is_empty());
        assert_eq!(msx.bus().vdp().frame_count(), 2);
    }

    #[test]
    fn test_keyboard_through_tick() {
        let mut msx = machine();
        script(&mut msx, &[Op::Out(0xAA, 0x53), Op::In(0xA9)]);
        msx.tick(0, 0, b'C');
        assert_eq!(msx.cpu().values, vec![!0x01]);

        let mut map = [0u8; 11];
        map[3] = 0x80;
        script(&mut msx, &[Op::In(0xA9)]);
        msx.tick_with_keymap(0, 0, &map);
        assert_eq!(msx.cpu().values[1], 0x7F);
    }

    #[test]
    fn test_key_assign() {
        let mut msx = machine();
        msx.setup_key_assign(0, JOY_S2, b' ');
        msx.setup_key_assign(5, JOY_S1, b'a');
        msx.setup_key_assign(1, JOY_S1, 0x01);
        script(&mut msx, &[Op::Out(0xAA, 0x58), Op::In(0xA9)]);
        msx.tick(JOY_S2, JOY_S1, 0);
        assert_eq!(msx.cpu().values, vec![0xFE]);
    }

    #[test]
    fn test_sound_pull() {
        let mut msx = machine();
        msx.tick(0, 0, 0);
        let samples = msx.take_sound().len();
        assert!((730..=740).contains(&samples));
        assert!(msx.take_sound().is_empty());
    }

    #[test]
    fn test_cartridge_mount() {
        let config = MsxConfig {
            rom_type: 6,
            ..MsxConfig::default()
        };
        let mut msx = Msx1::new(config, ScriptedCpu::new(4)).unwrap();
        assert!(!msx.is_mounted("Cartridge"));
        msx.mount("Cartridge", &banked_rom(16)).unwrap();
        assert!(msx.is_mounted("Cartridge"));
        assert_eq!(msx.bus().mmu().rom_type(), Some(RomType::Konami));

        script(
            &mut msx,
            &[
                Op::Out(0xA8, 0b11_01_01_00),
                Op::Write(0x8000, 7),
                Op::Read(0x8000),
                Op::Read(0x4000),
            ],
        );
        msx.tick(0, 0, 0);
        assert_eq!(msx.cpu().values, vec![7, 0]);

        msx.unmount("Cartridge").unwrap();
        assert!(!msx.is_mounted("Cartridge"));
        assert_eq!(msx.bus().mmu().read(0x4000), 0xFF);
    }

    #[test]
    fn test_unknown_rom_type_mount() {
        let config = MsxConfig {
            rom_type: 5,
            ..MsxConfig::default()
        };
        let mut msx = Msx1::new(config, ScriptedCpu::new(4)).unwrap();
        assert!(matches!(
            msx.mount("Cartridge", &[0; 0x4000]),
            Err(MsxError::UnknownRomType(5))
        ));
        assert!(!msx.is_mounted("Cartridge"));
    }

    #[test]
    fn test_bios_mount() {
        let mut msx = machine();
        msx.mount("BIOS", &[0xC3; 0x8000]).unwrap();
        assert!(msx.is_mounted("BIOS"));
        assert_eq!(msx.bus().mmu().read(0x7FFF), 0xC3);
        assert_eq!(msx.bus().mmu().block(0, 0).unwrap().label(), "MAIN");
        msx.unmount("BIOS").unwrap();
        assert!(!msx.is_mounted("BIOS"));
        assert_eq!(msx.bus().mmu().read(0x0000), 0xFF);
        assert!(matches!(
            msx.mount("Disk", &[]),
            Err(MsxError::InvalidMountPoint(_))
        ));
    }

    #[test]
    fn test_snapshot_layout() {
        let mut msx = machine();
        let data = msx.quick_save().unwrap();
        let expected = MsxBus::BOARD_CONTEXT_LEN
            + Z80Registers::ENCODED_LEN
            + MmuContext::ENCODED_LEN
            + VdpContext::ENCODED_LEN
            + 0x10000
            + msx.bus().psg().context().len()
            + 6 * CHUNK_HEADER_LEN;
        assert_eq!(data.len(), expected);
        let kinds: Vec<_> = ChunkReader::new(&data).map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Board,
                ChunkKind::Cpu,
                ChunkKind::Mmu,
                ChunkKind::Ram,
                ChunkKind::Psg,
                ChunkKind::Vdp
            ]
        );
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let rom = banked_rom(32);
        let mut msx = machine();
        msx.load_rom(&rom, RomType::Asc8Sram2).unwrap();
        script(
            &mut msx,
            &[
                Op::Out(0xA8, 0b11_01_01_00),
                Op::Write(0x6000, 5),
                Op::Write(0x7000, 0x10),
                Op::Write(0x8123, 0x99),
                Op::Write(0xC000, 0x12),
                Op::Write(0xFFFF, 0x34),
                Op::Out(0x99, 0x00),
                Op::Out(0x99, 0x40),
                Op::Out(0x98, 0xAB),
                Op::Out(0x98, 0xCD),
                Op::Out(0x99, 0xF4),
                Op::Out(0x99, 0x87),
                Op::Out(0xA0, 8),
                Op::Out(0xA1, 0x0F),
            ],
        );
        msx.tick(0, 0, 0);
        let mut regs = msx.cpu().regs;
        regs.pc = 0x4010;
        msx.cpu.set_registers(regs);

        let data = msx.quick_save().unwrap();
        assert_eq!(
            ChunkReader::new(&data).nth(4).map(|c| c.kind),
            Some(ChunkKind::Sram)
        );

        let mut other = machine();
        other.load_rom(&rom, RomType::Asc8Sram2).unwrap();
        assert_eq!(other.quick_load(&data), 7);

        assert_eq!(other.bus().mmu().ram(), msx.bus().mmu().ram());
        assert_eq!(other.bus().mmu().sram(), msx.bus().mmu().sram());
        assert_eq!(other.bus().mmu().context(), msx.bus().mmu().context());
        assert_eq!(other.bus().vdp().context(), msx.bus().vdp().context());
        assert_eq!(other.bus().board_context(), msx.bus().board_context());
        assert_eq!(other.bus().psg().context(), msx.bus().psg().context());
        assert_eq!(other.cpu().regs.pc, 0x4010);

        // Bank registers were turned back into mappings
        assert_eq!(other.bus().mmu().read(0x4000), 5);
        assert_eq!(other.bus().mmu().read(0x8123), 0x99);
        assert_eq!(other.backdrop_color(false), msx.backdrop_color(false));
    }

    #[test]
    fn test_truncated_snapshot_keeps_defaults() {
        let mut msx = machine();
        script(&mut msx, &[Op::Out(0xA8, 0xFF), Op::Write(0xC000, 0x77)]);
        msx.tick(0, 0, 0);
        let data = msx.quick_save().unwrap();

        // Cut inside the RAM chunk: BRD, Z80 and MMU survive
        let cut = 3 * CHUNK_HEADER_LEN
            + MsxBus::BOARD_CONTEXT_LEN
            + Z80Registers::ENCODED_LEN
            + MmuContext::ENCODED_LEN
            + 100;
        let mut other = machine();
        assert_eq!(other.quick_load(&data[..cut]), 3);
        assert_eq!(other.bus().mmu().primary(), 0xFF);
        assert_eq!(other.bus().mmu().read(0xC000), 0x00);
        assert_eq!(other.bus().vdp().frame_count(), 0);
    }

    #[test]
    fn test_eject_resets_banks() {
        let mut msx = machine();
        msx.load_rom(&banked_rom(8), RomType::Asc16).unwrap();
        assert_eq!(msx.bus().mmu().context().banks, [[0, 1, 2, 3]; 2]);
        msx.eject_rom();
        assert!(!msx.bus().mmu().has_cartridge());
        assert_eq!(msx.bus().mmu().context().banks, [[0, 1, 2, 3]; 2]);
    }

    #[test]
    fn test_debug_state() {
        let mut msx = machine();
        msx.load_rom(&banked_rom(4), RomType::Asc8).unwrap();
        let state = msx.debug_state();
        assert_eq!(state["cpu"]["sp"], 0xF000);
        assert_eq!(state["board"]["reg_c"], 0x50);
        assert_eq!(state["mmu"]["rom_type"], 1);
        assert_eq!(state["mmu"]["blocks"][1][2], "CART");
        assert_eq!(state["vdp"]["mode"], "Graphic1");
    }

    #[test]
    fn test_line_callback_and_color_mode() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let config = MsxConfig {
            color_mode: ColorMode::Rgb565Swap,
            ..MsxConfig::default()
        };
        let mut msx = Msx1::new(config, ScriptedCpu::new(4)).unwrap();
        let lines = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lines);
        msx.set_line_callback(Some(Box::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        })));
        script(&mut msx, &[Op::Out(0x99, 0x0F), Op::Out(0x99, 0x87)]);
        msx.tick(0, 0, 0);
        assert_eq!(lines.load(Ordering::Relaxed), 192);
        assert_eq!(msx.backdrop_color(false), ColorMode::Rgb565Swap.pack(0xFFFFFF));
        assert!(msx.display().pixels.iter().all(|&p| p == 0xFFFF));
    }

    #[test]
    fn test_step_frame_reuses_last_input() {
        let mut msx = machine();
        msx.tick(0, 0, b' ');
        let frame = msx.step_frame().unwrap();
        assert_eq!(frame.pixels.len(), 256 * 192);
        assert_eq!(msx.bus().board().key, b' ');
        assert_eq!(msx.bus().vdp().frame_count(), 2);
    }
}
