//! General Instrument AY-3-8910 Programmable Sound Generator
//!
//! The PSG used by MSX computers (and the ZX Spectrum 128, Amstrad CPC...).
//!
//! # Architecture
//! - 3 square wave tone channels with 12-bit periods
//! - 1 noise generator (17-bit LFSR) mixable into any channel
//! - 1 envelope generator with 16 shape codes
//! - 4-bit volume per channel, or envelope-driven volume
//! - 2 I/O ports (registers 14/15) which MSX wires to the joystick pins
//!
//! Periods are kept pre-shifted by 4 bits so a single tick can advance the
//! counters by a fractional number of chip clocks.

use crate::apu::SoundDevice;
use serde::{Deserialize, Serialize};

/// Writable bits of each register
const REGISTER_MASK: [u8; 16] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0xFF, 0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF,
];

/// Logarithmic DAC output levels, indexed by 5-bit volume
const LEVELS: [u32; 32] = [
    0, 1, 1, 1, 2, 2, 3, 4, 5, 6, 7, 9, 10, 12, 15, 18, 22, 26, 31, 37, 44, 53, 63, 75, 90, 107,
    127, 151, 180, 214, 255, 255,
];

/// Chip clocks (x16) advanced per output sample at 44.1kHz
pub const DEFAULT_CYCLES_PER_SAMPLE: u32 = 81;

/// Output attenuation presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PsgVolume {
    Mute,
    Low,
    #[default]
    Mid,
    High,
    Raw,
}

impl PsgVolume {
    fn shift(self) -> u32 {
        match self {
            PsgVolume::Mute => 16,
            PsgVolume::Low => 10,
            PsgVolume::Mid => 7,
            PsgVolume::High => 4,
            PsgVolume::Raw => 0,
        }
    }
}

/// Mutable chip state (everything captured by a snapshot)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PsgState {
    latch: u8,
    reg: [u8; 16],
    tone_period: [u32; 3],
    tone_counter: [i32; 3],
    tone_up: [bool; 3],
    noise_period: u32,
    noise_counter: i32,
    noise_up: bool,
    env_period: u32,
    env_counter: i32,
    env_level: u32,
    env_step: i32,
    env_running: bool,
    random: u32,
    mix: [i32; 3],
}

impl PsgState {
    const ENCODED_LEN: usize = 1 + 16 + 12 + 12 + 3 + 4 + 4 + 1 + 4 + 4 + 4 + 4 + 1 + 4 + 12;

    fn power_on() -> Self {
        let mut reg = [0; 16];
        reg[7] = 0x80;
        reg[14] = 0x7F;
        Self {
            reg,
            env_period: 1,
            env_step: 1,
            random: 0xFFFF,
            ..Self::default()
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.push(self.latch);
        out.extend_from_slice(&self.reg);
        for p in self.tone_period {
            out.extend_from_slice(&p.to_le_bytes());
        }
        for c in self.tone_counter {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend(self.tone_up.iter().map(|&u| u as u8));
        out.extend_from_slice(&self.noise_period.to_le_bytes());
        out.extend_from_slice(&self.noise_counter.to_le_bytes());
        out.push(self.noise_up as u8);
        out.extend_from_slice(&self.env_period.to_le_bytes());
        out.extend_from_slice(&self.env_counter.to_le_bytes());
        out.extend_from_slice(&self.env_level.to_le_bytes());
        out.extend_from_slice(&self.env_step.to_le_bytes());
        out.push(self.env_running as u8);
        out.extend_from_slice(&self.random.to_le_bytes());
        for m in self.mix {
            out.extend_from_slice(&m.to_le_bytes());
        }
        out
    }

    fn load_bytes(&mut self, data: &[u8]) {
        let mut buf = self.to_bytes();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        let mut r = Cursor { buf: &buf, pos: 0 };
        self.latch = r.byte() & 0x0F;
        for reg in self.reg.iter_mut() {
            *reg = r.byte();
        }
        for p in self.tone_period.iter_mut() {
            *p = r.word();
        }
        for c in self.tone_counter.iter_mut() {
            *c = r.word() as i32;
        }
        for up in self.tone_up.iter_mut() {
            *up = r.byte() != 0;
        }
        self.noise_period = r.word();
        self.noise_counter = r.word() as i32;
        self.noise_up = r.byte() != 0;
        self.env_period = r.word().max(1);
        self.env_counter = r.word() as i32;
        self.env_level = r.word() & 0x1F;
        self.env_step = if (r.word() as i32) < 0 { -1 } else { 1 };
        self.env_running = r.byte() != 0;
        self.random = r.word();
        for m in self.mix.iter_mut() {
            *m = r.word() as i32;
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn byte(&mut self) -> u8 {
        let b = self.buf[self.pos];
        self.pos += 1;
        b
    }

    fn word(&mut self) -> u32 {
        u32::from_le_bytes([self.byte(), self.byte(), self.byte(), self.byte()])
    }
}

/// AY-3-8910 PSG
pub struct Ay8910 {
    state: PsgState,
    levels: [u32; 32],
    gain: u32,
    volume: PsgVolume,
    cycles_per_sample: u32,
}

impl Ay8910 {
    /// Create a new PSG
    ///
    /// # Arguments
    /// * `gain` - Multiplier applied to the DAC level table
    pub fn new(gain: u32) -> Self {
        let mut psg = Self {
            state: PsgState::power_on(),
            levels: LEVELS,
            gain,
            volume: PsgVolume::default(),
            cycles_per_sample: DEFAULT_CYCLES_PER_SAMPLE,
        };
        psg.reset_state();
        psg
    }

    pub fn set_volume(&mut self, volume: PsgVolume) {
        self.volume = volume;
    }

    pub fn volume(&self) -> PsgVolume {
        self.volume
    }

    /// Joystick port A as seen by the machine (active low)
    pub fn pad1(&self) -> u8 {
        self.state.reg[14]
    }

    /// Joystick port B as seen by the machine (active low)
    pub fn pad2(&self) -> u8 {
        self.state.reg[15]
    }

    fn reset_state(&mut self) {
        self.state = PsgState::power_on();
        for (level, base) in self.levels.iter_mut().zip(LEVELS) {
            *level = base * self.gain;
        }
    }

    fn write_register(&mut self, value: u8) {
        let latch = self.state.latch as usize;
        let s = &mut self.state;
        s.reg[latch] = value & REGISTER_MASK[latch];
        let value = value as u32;
        match latch {
            0 | 2 | 4 => {
                let ch = latch / 2;
                s.tone_period[ch] = (s.tone_period[ch] & 0xF000) | (value << 4);
            }
            1 | 3 | 5 => {
                let ch = latch / 2;
                s.tone_period[ch] = (s.tone_period[ch] & 0x0FF0) | ((value & 0x0F) << 12);
            }
            6 => s.noise_period = (value & 0x1F) << 4,
            11 => {
                s.env_period = (s.env_period & 0xFF000) | (value << 4);
                s.env_period = s.env_period.max(1);
            }
            12 => {
                s.env_period = (s.env_period & 0x00FF0) | (value << 12);
                s.env_period = s.env_period.max(1);
            }
            13 => {
                // Attack bit selects the initial direction
                if value & 0x04 != 0 {
                    s.env_step = 1;
                    s.env_level = 0;
                } else {
                    s.env_step = -1;
                    s.env_level = 0x1F;
                }
                s.env_counter = 0;
                s.env_running = true;
            }
            _ => {}
        }
    }

    fn clock_envelope(&mut self, cycles: u32) {
        let s = &mut self.state;
        if !s.env_running {
            return;
        }
        s.env_counter += cycles as i32;
        while s.env_running && s.env_counter > 0 {
            s.env_counter -= s.env_period as i32;
            let next = s.env_level as i32 + s.env_step;
            if (0..=0x1F).contains(&next) {
                s.env_level = next as u32;
                continue;
            }
            let restart = |step: i32| if step == 1 { 0 } else { 0x1F };
            match s.reg[13] {
                // Sawtooth: restart from the same end
                8 | 12 => s.env_level = restart(s.env_step),
                // Triangle: reverse direction
                10 | 14 => {
                    s.env_step = -s.env_step;
                    s.env_level = restart(s.env_step);
                }
                // Hold at the far end of the ramp
                11 | 15 => {
                    s.env_level = restart(s.env_step);
                    s.env_running = false;
                }
                // Hold at the level the ramp ended on
                9 | 13 => {
                    s.env_step = -s.env_step;
                    s.env_level = restart(s.env_step);
                    s.env_running = false;
                }
                _ => {
                    s.env_level = 0;
                    s.env_running = false;
                }
            }
        }
    }

    fn next_random(&mut self) -> bool {
        let r = &mut self.state.random;
        if *r & 1 != 0 {
            *r ^= 0x24000;
            *r >>= 1;
            true
        } else {
            *r >>= 1;
            false
        }
    }

    fn clock_noise(&mut self, cycles: u32) {
        if self.state.noise_period == 0 {
            self.state.noise_up = self.next_random();
            return;
        }
        self.state.noise_counter += cycles as i32;
        while self.state.noise_counter >= 0 {
            self.state.noise_counter -= self.state.noise_period as i32;
            self.state.noise_up = self.next_random();
        }
    }

    /// Advance one tone channel and return its smoothed output.
    fn channel_output(&mut self, ch: usize, cycles: u32) -> i32 {
        let s = &mut self.state;
        let previous = s.mix[ch];
        if s.tone_period[ch] != 0 {
            s.tone_counter[ch] += cycles as i32;
            while s.tone_counter[ch] >= 0 {
                s.tone_counter[ch] -= s.tone_period[ch] as i32;
                s.tone_up[ch] = !s.tone_up[ch];
            }
        } else {
            s.tone_up[ch] = true;
        }

        let mixer = s.reg[7] >> ch;
        let tone_open = mixer & 0x01 != 0 || s.tone_up[ch];
        let noise_open = mixer & 0x08 != 0 || s.noise_up;
        if tone_open && noise_open {
            let volume = (s.reg[8 + ch] as usize) << 1;
            let level = if volume & 0x20 != 0 {
                self.levels[s.env_level as usize]
            } else {
                self.levels[volume & 0x1F]
            };
            s.mix[ch] = level as i32;
        } else {
            s.mix[ch] >>= 1;
        }
        (previous + s.mix[ch]) >> self.volume.shift()
    }

    /// Generate a single audio sample covering `cycles` chip clocks (x16)
    pub fn tick_cycles(&mut self, cycles: u32) -> i16 {
        self.clock_envelope(cycles);
        self.clock_noise(cycles);
        let mix: i32 = (0..3).map(|ch| self.channel_output(ch, cycles)).sum();
        mix.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

impl Default for Ay8910 {
    fn default() -> Self {
        Self::new(27)
    }
}

impl SoundDevice for Ay8910 {
    fn reset(&mut self) {
        self.reset_state();
    }

    fn set_pads(&mut self, pad1: u8, pad2: u8) {
        self.state.reg[14] = !pad1;
        self.state.reg[15] = !pad2;
    }

    fn latch(&mut self, value: u8) {
        self.state.latch = value & 0x0F;
    }

    fn write(&mut self, value: u8) {
        self.write_register(value);
    }

    fn read(&mut self) -> u8 {
        self.state.reg[self.state.latch as usize]
    }

    fn tick(&mut self) -> i16 {
        self.tick_cycles(self.cycles_per_sample)
    }

    fn context(&self) -> Vec<u8> {
        self.state.to_bytes()
    }

    fn set_context(&mut self, data: &[u8]) {
        self.state.load_bytes(data);
    }
}
