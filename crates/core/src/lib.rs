//! Core emulator primitives and traits.

pub mod apu;
pub mod cpu_z80;
pub mod graphics;
pub mod logging;
pub mod renderer;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A finished picture in packed 16-bit pixels.
    ///
    /// The pixel encoding is whatever [`crate::graphics::ColorMode`] the
    /// producing system was configured with.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u16>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// One row of pixels.
        pub fn row(&self, line: usize) -> &[u16] {
            let w = self.width as usize;
            &self.pixels[line * w..(line + 1) * w]
        }

        pub fn row_mut(&mut self, line: usize) -> &mut [u16] {
            let w = self.width as usize;
            &mut self.pixels[line * w..(line + 1) * w]
        }
    }
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge", "BIOS")
    pub id: String,
    /// User-friendly name for display (e.g., "Cartridge Slot", "BIOS ROM")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["rom", "mx1"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Serialize the machine state into a snapshot buffer.
    /// Snapshots never include ROM/cartridge data.
    fn save_state(&mut self) -> Result<Vec<u8>, Self::Error>;

    /// Restore a snapshot produced by [`System::save_state`].
    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false // Default: no save state support
    }

    /// Human readable machine state for debugging front-ends.
    fn debug_state(&self) -> Value {
        Value::Null
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
