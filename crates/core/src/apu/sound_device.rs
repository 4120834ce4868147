//! Sound device trait for pluggable PSG implementations.
//!
//! A machine talks to its sound chip through this interface only, so the
//! emulation can be swapped for a host-side implementation (or a silent
//! stub in tests) without touching the machine code.

/// A programmable sound generator attached through I/O ports.
pub trait SoundDevice: Send {
    /// Reset the chip to power-on state
    fn reset(&mut self);

    /// Present joystick state to the chip's I/O ports.
    ///
    /// Pads use the active-high layout up/down/left/right/trigger1/
    /// trigger2/select1/select2 (bit 0 to bit 7).
    fn set_pads(&mut self, pad1: u8, pad2: u8);

    /// Select the register addressed by subsequent reads and writes
    fn latch(&mut self, value: u8);

    /// Write the latched register
    fn write(&mut self, value: u8);

    /// Read the latched register
    fn read(&mut self) -> u8;

    /// Produce one output sample
    fn tick(&mut self) -> i16;

    /// Serialize internal state for snapshots
    fn context(&self) -> Vec<u8>;

    /// Restore internal state from [`SoundDevice::context`] output.
    /// Short or malformed input must be tolerated.
    fn set_context(&mut self, data: &[u8]);
}
