//! Packed 16-bit pixel formats
//!
//! Palettes are authored as RGB888 (0x00RRGGBB) and converted once into the
//! packed format a host asked for.

use serde::{Deserialize, Serialize};

/// Packed pixel encoding selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// 0RRRRRGGGGGBBBBB
    Rgb555,
    /// RRRRRGGGGGGBBBBB
    #[default]
    Rgb565,
    /// RGB565 with the two bytes exchanged (big-endian displays)
    Rgb565Swap,
}

impl ColorMode {
    /// Convert an RGB888 color into this packed format
    #[inline]
    pub fn pack(self, rgb: u32) -> u16 {
        match self {
            ColorMode::Rgb555 => ColorOps::to_rgb555(rgb),
            ColorMode::Rgb565 => ColorOps::to_rgb565(rgb),
            ColorMode::Rgb565Swap => ColorOps::swap16(ColorOps::to_rgb565(rgb)),
        }
    }

    /// Convert a whole palette
    pub fn pack_palette<const N: usize>(self, palette: &[u32; N]) -> [u16; N] {
        palette.map(|c| self.pack(c))
    }
}

/// Color operation utilities
pub struct ColorOps;

impl ColorOps {
    /// Extract red channel from an RGB888 color
    #[inline]
    pub fn red(color: u32) -> u8 {
        ((color >> 16) & 0xFF) as u8
    }

    /// Extract green channel from an RGB888 color
    #[inline]
    pub fn green(color: u32) -> u8 {
        ((color >> 8) & 0xFF) as u8
    }

    /// Extract blue channel from an RGB888 color
    #[inline]
    pub fn blue(color: u32) -> u8 {
        (color & 0xFF) as u8
    }

    #[inline]
    pub fn to_rgb555(color: u32) -> u16 {
        (((color & 0xF80000) >> 9) | ((color & 0x00F800) >> 6) | ((color & 0x0000F8) >> 3)) as u16
    }

    #[inline]
    pub fn to_rgb565(color: u32) -> u16 {
        (((color & 0xF80000) >> 8) | ((color & 0x00FC00) >> 5) | ((color & 0x0000F8) >> 3)) as u16
    }

    /// Exchange the high and low byte
    #[inline]
    pub fn swap16(value: u16) -> u16 {
        value.rotate_left(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_component_extraction() {
        let color = 0x00BBCCDD;
        assert_eq!(ColorOps::red(color), 0xBB);
        assert_eq!(ColorOps::green(color), 0xCC);
        assert_eq!(ColorOps::blue(color), 0xDD);
    }

    #[test]
    fn test_pack_primaries() {
        assert_eq!(ColorMode::Rgb555.pack(0xFF0000), 0x7C00);
        assert_eq!(ColorMode::Rgb555.pack(0x00FF00), 0x03E0);
        assert_eq!(ColorMode::Rgb555.pack(0x0000FF), 0x001F);
        assert_eq!(ColorMode::Rgb565.pack(0xFF0000), 0xF800);
        assert_eq!(ColorMode::Rgb565.pack(0x00FF00), 0x07E0);
        assert_eq!(ColorMode::Rgb565.pack(0x0000FF), 0x001F);
        assert_eq!(ColorMode::Rgb565.pack(0xFFFFFF), 0xFFFF);
    }

    #[test]
    fn test_swapped_565() {
        assert_eq!(ColorMode::Rgb565Swap.pack(0xFF0000), 0x00F8);
        assert_eq!(ColorOps::swap16(0x1234), 0x3412);
    }

    #[test]
    fn test_pack_palette() {
        let packed = ColorMode::Rgb565.pack_palette(&[0x000000, 0xFFFFFF]);
        assert_eq!(packed, [0x0000, 0xFFFF]);
    }

    #[test]
    fn test_color_mode_serde() {
        let json = serde_json::to_string(&ColorMode::Rgb565Swap).unwrap();
        assert_eq!(json, "\"Rgb565Swap\"");
        let mode: ColorMode = serde_json::from_str("\"Rgb555\"").unwrap();
        assert_eq!(mode, ColorMode::Rgb555);
    }
}
