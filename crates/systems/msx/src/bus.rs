//! MSX1 bus: memory, I/O routing and peripheral clocks
//!
//! The Z80 core sees this type through [`Z80Bus`]. Memory accesses go to
//! the MMU, port accesses are decoded through [`PortMap`], and every
//! `consume_clock` call advances the PSG and the VDP by the exact number of
//! steps the elapsed CPU cycles are worth.

use crate::clock::{ClockDomain, PSG_SAMPLE_RATE, VDP_CLOCK};
use crate::keyboard::Keyboard;
use crate::mmu::Mmu;
use crate::ports::{InPort, OutPort, PortMap};
use crate::vdp::{Vdp, VdpEvents};
use emu_core::apu::SoundDevice;
use emu_core::cpu_z80::{BusSignals, Z80Bus};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::renderer::Renderer;

/// Byte placed on the data bus when the VDP interrupts
pub const BLANK_IRQ_VECTOR: u8 = 0x07;

/// Samples in the sound ring
pub const SOUND_BUFFER_LEN: usize = 1024;

/// Largest sound pull in bytes
pub const MAX_SOUND_SIZE: usize = 0x1000;

/// Called with the whole ring each time it fills
pub type SoundCallback = Box<dyn FnMut(&[i16]) + Send>;

/// PPI and input state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardState {
    /// Character code held this frame
    pub key: u8,
    /// How often the held key was scanned
    pub read_key: u8,
    /// PPI port C
    pub reg_c: u8,
    pub selected_row: u8,
    /// PSG register selected through port 0xA0
    pub psg_latch: u8,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            key: 0,
            read_key: 0,
            reg_c: 0x50,
            selected_row: 0,
            psg_latch: 0,
        }
    }
}

pub struct MsxBus {
    pub(crate) mmu: Mmu,
    pub(crate) vdp: Vdp,
    psg: Box<dyn SoundDevice>,
    keyboard: Keyboard,
    ports: PortMap,
    board: BoardState,
    psg_clock: ClockDomain,
    vdp_clock: ClockDomain,
    keymap: Option<Vec<u8>>,
    pads: [u8; 2],
    sound: Vec<i16>,
    sound_cursor: usize,
    sound_callback: Option<SoundCallback>,
    pending: BusSignals,
}

impl MsxBus {
    /// Length of the `BRD` snapshot payload
    pub const BOARD_CONTEXT_LEN: usize = 24;

    pub fn new(mmu: Mmu, vdp: Vdp, psg: Box<dyn SoundDevice>) -> Self {
        Self {
            mmu,
            vdp,
            psg,
            keyboard: Keyboard::new(),
            ports: PortMap::new(),
            board: BoardState::default(),
            psg_clock: ClockDomain::new(PSG_SAMPLE_RATE),
            vdp_clock: ClockDomain::new(VDP_CLOCK),
            keymap: None,
            pads: [0; 2],
            sound: vec![0; SOUND_BUFFER_LEN],
            sound_cursor: 0,
            sound_callback: None,
            pending: BusSignals::default(),
        }
    }

    /// Power-on state for everything behind the bus. Key bindings and
    /// callbacks are kept.
    pub fn reset(&mut self) {
        self.mmu.reset();
        self.vdp.reset();
        self.psg.reset();
        self.board = BoardState::default();
        self.psg_clock.reset();
        self.vdp_clock.reset();
        self.keymap = None;
        self.sound.fill(0);
        self.sound_cursor = 0;
        self.pending = BusSignals::default();
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    pub fn vdp(&self) -> &Vdp {
        &self.vdp
    }

    pub fn vdp_mut(&mut self) -> &mut Vdp {
        &mut self.vdp
    }

    pub fn psg(&self) -> &dyn SoundDevice {
        self.psg.as_ref()
    }

    pub fn psg_mut(&mut self) -> &mut dyn SoundDevice {
        self.psg.as_mut()
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    /// Latch this frame's input: pads plus either one key or a row map
    pub fn set_input(&mut self, pad1: u8, pad2: u8, key: u8, keymap: Option<&[u8]>) {
        self.pads = [pad1, pad2];
        self.psg.set_pads(pad1, pad2);
        match keymap {
            Some(map) => {
                self.board.key = 0;
                self.keymap = Some(map.to_vec());
            }
            None => {
                self.board.key = key;
                self.keymap = None;
            }
        }
    }

    pub fn set_sound_callback(&mut self, callback: Option<SoundCallback>) {
        self.sound_callback = callback;
    }

    /// Samples produced since the last pull
    pub fn take_sound(&mut self) -> &[i16] {
        let len = self.sound_cursor;
        self.sound_cursor = 0;
        &self.sound[..len]
    }

    pub fn pending_sound(&self) -> usize {
        self.sound_cursor
    }

    /// `BRD` chunk payload
    pub fn board_context(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::BOARD_CONTEXT_LEN);
        out.extend_from_slice(&[
            self.board.key,
            self.board.read_key,
            self.board.reg_c,
            self.board.selected_row,
            self.board.psg_latch,
            0,
            0,
            0,
        ]);
        out.extend_from_slice(&self.psg_clock.accumulator().to_le_bytes());
        out.extend_from_slice(&self.vdp_clock.accumulator().to_le_bytes());
        out
    }

    /// Restore a `BRD` payload. Missing trailing bytes keep current values.
    pub fn set_board_context(&mut self, data: &[u8]) {
        let mut buf = self.board_context();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        let long = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[at..at + 8]);
            i64::from_le_bytes(bytes)
        };
        self.board = BoardState {
            key: buf[0],
            read_key: buf[1],
            reg_c: buf[2],
            selected_row: buf[3],
            psg_latch: buf[4],
        };
        self.psg_clock.set_accumulator(long(8));
        self.vdp_clock.set_accumulator(long(16));
    }

    fn raise(&mut self, events: VdpEvents) {
        if events.blank {
            self.pending.irq = Some(BLANK_IRQ_VECTOR);
        }
        self.pending.frame_break |= events.frame_break;
    }

    fn push_sample(&mut self, sample: i16) {
        self.sound[self.sound_cursor] = sample;
        self.sound_cursor += 1;
        if self.sound_cursor == SOUND_BUFFER_LEN {
            self.sound_cursor = 0;
            if let Some(callback) = self.sound_callback.as_mut() {
                callback(&self.sound);
            }
        }
    }

    fn write_port_c(&mut self, value: u8) {
        let changed = self.board.reg_c ^ value;
        if changed == 0 {
            return;
        }
        self.board.reg_c = value;
        if changed & 0x0F != 0 {
            self.board.selected_row = value & 0x0F;
        }
    }

    /// PPI bit set/reset on port C
    fn write_ppi_control(&mut self, value: u8) {
        if value & 0x80 != 0 {
            return;
        }
        let bit = (value & 0x0E) >> 1;
        if value & 0x01 != 0 {
            self.board.reg_c |= 1 << bit;
        } else {
            self.board.reg_c &= !(1 << bit);
        }
        if bit <= 3 {
            self.board.selected_row = self.board.reg_c & 0x0F;
        }
    }

    fn read_keyboard(&mut self) -> u8 {
        self.keyboard.scan(
            self.board.selected_row,
            self.board.key,
            self.keymap.as_deref(),
            self.pads,
            &mut self.board.read_key,
        )
    }
}

impl Z80Bus for MsxBus {
    fn read(&self, addr: u16) -> u8 {
        self.mmu.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.mmu.write(addr, val);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        let port = port as u8;
        match self.ports.input(port) {
            InPort::VdpData => self.vdp.read_data(),
            InPort::VdpStatus => self.vdp.read_status(),
            InPort::PsgData => {
                let value = self.psg.read();
                // S1/S2 of the joystick ports read as not pushed
                if matches!(self.board.psg_latch, 14 | 15) {
                    value | 0xC0
                } else {
                    value
                }
            }
            InPort::PrimarySlot => self.mmu.primary(),
            InPort::KeyboardRow => self.read_keyboard(),
            InPort::PpiPortC => self.board.reg_c,
            InPort::Unmapped => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("BUS: read from unmapped port {:02X}", port)
                });
                0xFF
            }
        }
    }

    fn io_write(&mut self, port: u16, val: u8) {
        let port = port as u8;
        match self.ports.output(port) {
            OutPort::VdpData => self.vdp.write_data(val),
            OutPort::VdpAddress => {
                let events = self.vdp.write_address(val);
                self.raise(events);
            }
            OutPort::PsgLatch => {
                self.board.psg_latch = val & 0x0F;
                self.psg.latch(val);
            }
            OutPort::PsgData => self.psg.write(val),
            OutPort::PrimarySlot => self.mmu.set_primary(val),
            OutPort::PpiPortC => self.write_port_c(val),
            OutPort::PpiControl => self.write_ppi_control(val),
            OutPort::Unmapped => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("BUS: write {:02X} to unmapped port {:02X}", val, port)
                });
            }
        }
    }

    fn consume_clock(&mut self, cycles: u32) -> BusSignals {
        for _ in 0..self.psg_clock.advance(cycles) {
            let sample = self.psg.tick();
            self.push_sample(sample);
        }

        let steps = self.vdp_clock.advance_batched(cycles);
        let events = self.vdp.tick(steps);
        self.raise(events);

        std::mem::take(&mut self.pending)
    }
}
