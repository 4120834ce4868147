//! Clock domains derived from the CPU clock
//!
//! Peripherals run on their own clocks. Each keeps a signed remainder in
//! units of `cpu_hz * device_hz` so no time is lost between calls.

/// Z80 clock in Hz
pub const CPU_CLOCK: u32 = 3_579_545;
/// VDP pixel step clock in Hz
pub const VDP_CLOCK: u32 = 5_370_863;
/// PSG output sample rate in Hz
pub const PSG_SAMPLE_RATE: u32 = 44_100;

/// A device clock slaved to the CPU clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDomain {
    hz: u32,
    accumulator: i64,
}

impl ClockDomain {
    pub const fn new(hz: u32) -> Self {
        Self { hz, accumulator: 0 }
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    pub fn accumulator(&self) -> i64 {
        self.accumulator
    }

    pub fn set_accumulator(&mut self, value: i64) {
        self.accumulator = value;
    }

    pub fn reset(&mut self) {
        self.accumulator = 0;
    }

    /// Add `cycles` CPU clocks and return the number of device steps to run
    /// in one batch: `accumulator / CPU_CLOCK + 1`. The batch overshoots by
    /// one step and the remainder goes negative, which later calls pay back.
    ///
    /// Division truncates toward zero, so a remainder above `-CPU_CLOCK`
    /// still yields one step and anything lower yields none. The remainder
    /// therefore never drops below `-2 * CPU_CLOCK`.
    pub fn advance_batched(&mut self, cycles: u32) -> u32 {
        self.accumulator += cycles as i64 * self.hz as i64;
        let steps = (self.accumulator / CPU_CLOCK as i64 + 1).max(0);
        self.accumulator -= steps * CPU_CLOCK as i64;
        steps as u32
    }

    /// Add `cycles` CPU clocks and return how many device ticks elapsed,
    /// one at a time.
    pub fn advance(&mut self, cycles: u32) -> u32 {
        self.accumulator += cycles as i64 * self.hz as i64;
        let mut ticks = 0;
        while self.accumulator > 0 {
            self.accumulator -= CPU_CLOCK as i64;
            ticks += 1;
        }
        ticks
    }
}
