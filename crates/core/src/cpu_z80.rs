//! Zilog Z80 processor boundary
//!
//! Machines built on the Z80 do not own an instruction decoder here. They
//! implement [`Z80Bus`] and are driven by any core implementing [`Z80Cpu`].
//! The core reports the cycles it consumes back through the bus, which is
//! where a machine advances its peripherals and raises interrupts.

/// Interrupt lines raised by the bus while the processor was running.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusSignals {
    /// Maskable interrupt request. The value is the byte placed on the
    /// data bus during acknowledge.
    pub irq: Option<u8>,
    /// The machine reached a frame boundary; the processor should stop
    /// executing and return to the host.
    pub frame_break: bool,
}

impl BusSignals {
    /// Fold another set of signals into this one.
    pub fn merge(&mut self, other: BusSignals) {
        if other.irq.is_some() {
            self.irq = other.irq;
        }
        self.frame_break |= other.frame_break;
    }

    pub fn is_empty(&self) -> bool {
        self.irq.is_none() && !self.frame_break
    }
}

/// Memory and I/O interface seen by a Z80 core
pub trait Z80Bus {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8);

    /// Read from I/O port. Only the low byte selects the device.
    fn io_read(&mut self, port: u16) -> u8 {
        let _ = port;
        0xFF
    }

    /// Write to I/O port
    fn io_write(&mut self, port: u16, val: u8) {
        let _ = (port, val);
    }

    /// Report processor clocks consumed since the last call.
    ///
    /// Returns every signal raised since the previous call, including
    /// interrupts triggered by port writes.
    fn consume_clock(&mut self, cycles: u32) -> BusSignals;
}

/// Z80 register file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Z80Registers {
    /// Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    /// Shadow registers
    pub a_prime: u8,
    pub f_prime: u8,
    pub b_prime: u8,
    pub c_prime: u8,
    pub d_prime: u8,
    pub e_prime: u8,
    pub h_prime: u8,
    pub l_prime: u8,

    pub ix: u16,
    pub iy: u16,

    /// Interrupt vector
    pub i: u8,
    /// Memory refresh
    pub r: u8,

    pub sp: u16,
    pub pc: u16,

    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode (0, 1, or 2)
    pub im: u8,
    pub halted: bool,
}

impl Z80Registers {
    /// Size of the encoding produced by [`Z80Registers::to_bytes`].
    pub const ENCODED_LEN: usize = 30;

    /// Register state an MSX BIOS expects at power-on: every pair and shadow
    /// pair reads 0xFFFF, the stack sits at 0xF000, everything else is zero.
    pub fn power_on() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            b: 0xFF,
            c: 0xFF,
            d: 0xFF,
            e: 0xFF,
            h: 0xFF,
            l: 0xFF,
            a_prime: 0xFF,
            f_prime: 0xFF,
            b_prime: 0xFF,
            c_prime: 0xFF,
            d_prime: 0xFF,
            e_prime: 0xFF,
            h_prime: 0xFF,
            l_prime: 0xFF,
            ix: 0xFFFF,
            iy: 0xFFFF,
            sp: 0xF000,
            ..Self::default()
        }
    }

    /// Fixed little-endian layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(&[
            self.a, self.f, self.b, self.c, self.d, self.e, self.h, self.l,
        ]);
        out.extend_from_slice(&[
            self.a_prime,
            self.f_prime,
            self.b_prime,
            self.c_prime,
            self.d_prime,
            self.e_prime,
            self.h_prime,
            self.l_prime,
        ]);
        out.extend_from_slice(&self.ix.to_le_bytes());
        out.extend_from_slice(&self.iy.to_le_bytes());
        out.push(self.i);
        out.push(self.r);
        out.extend_from_slice(&self.sp.to_le_bytes());
        out.extend_from_slice(&self.pc.to_le_bytes());
        out.push(self.iff1 as u8);
        out.push(self.iff2 as u8);
        out.push(self.im);
        out.push(self.halted as u8);
        out
    }

    /// Decode a register file. Missing trailing bytes keep the values
    /// already present in `self`.
    pub fn load_bytes(&mut self, data: &[u8]) {
        let mut buf = self.to_bytes();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        let word = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        self.a = buf[0];
        self.f = buf[1];
        self.b = buf[2];
        self.c = buf[3];
        self.d = buf[4];
        self.e = buf[5];
        self.h = buf[6];
        self.l = buf[7];
        self.a_prime = buf[8];
        self.f_prime = buf[9];
        self.b_prime = buf[10];
        self.c_prime = buf[11];
        self.d_prime = buf[12];
        self.e_prime = buf[13];
        self.h_prime = buf[14];
        self.l_prime = buf[15];
        self.ix = word(16);
        self.iy = word(18);
        self.i = buf[20];
        self.r = buf[21];
        self.sp = word(22);
        self.pc = word(24);
        self.iff1 = buf[26] != 0;
        self.iff2 = buf[27] != 0;
        self.im = buf[28];
        self.halted = buf[29] != 0;
    }
}

/// A Z80 instruction core that can be plugged into a machine.
pub trait Z80Cpu {
    /// Reset internal execution state (pipeline, pending interrupts).
    fn reset(&mut self);

    /// Execute instructions against `bus`, reporting clock consumption
    /// through [`Z80Bus::consume_clock`], until a frame break is signalled.
    fn execute<B: Z80Bus>(&mut self, bus: &mut B);

    fn registers(&self) -> Z80Registers;

    fn set_registers(&mut self, regs: Z80Registers);
}
