//! Core APU (Audio Processing Unit) components.
//!
//! ## Sound devices
//!
//! - **SoundDevice trait**: the capability a machine depends on. A machine
//!   only ever latches a register, writes/reads it, forwards joystick pads
//!   and pulls samples, so the concrete chip can live in this crate or be
//!   supplied by the host.
//! - **AY-3-8910**: General Instrument PSG used by the MSX family
//!   (3 tone channels, noise, envelope generator, two I/O ports).

pub mod ay8910;
pub mod sound_device;

pub use ay8910::{Ay8910, PsgVolume};
pub use sound_device::SoundDevice;
