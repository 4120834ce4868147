//! Common renderer trait
//!
//! Video chips that draw into a host-visible framebuffer implement
//! [`Renderer`] so front-ends can pull the picture without knowing which
//! machine produced it.
//!
//! ```text
//! System (state management) -> Renderer trait -> framebuffer
//! ```
//!
//! Pixel values are packed 16-bit colors in whatever
//! [`crate::graphics::ColorMode`] the renderer was built for.

use crate::types::Frame;

/// Common renderer trait for emulated graphics chips
pub trait Renderer: Send {
    /// Get the current framebuffer (read-only)
    fn get_frame(&self) -> &Frame;

    /// Fill the framebuffer with a packed color
    fn clear(&mut self, color: u16);

    /// Reset the renderer to its initial state
    fn reset(&mut self);

    /// Get the name of this renderer (for debugging/UI)
    fn name(&self) -> &str;
}
