//! Machine configuration

use emu_core::apu::PsgVolume;
use emu_core::graphics::ColorMode;
use serde::{Deserialize, Serialize};

/// Startup options for an [`crate::Msx1`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsxConfig {
    /// Main RAM in bytes: 8K, 16K, 32K or 64K
    pub ram_size: usize,
    /// Pixel encoding baked into the palette
    pub color_mode: ColorMode,
    /// Mapper code used when a cartridge is mounted without one
    pub rom_type: u8,
    /// Output gain of the bundled AY-3-8910
    pub psg_gain: u32,
    /// Attenuation applied to the bundled AY-3-8910 mix
    pub psg_volume: PsgVolume,
}

impl Default for MsxConfig {
    fn default() -> Self {
        Self {
            ram_size: 0x10000,
            color_mode: ColorMode::Rgb565,
            rom_type: 0,
            psg_gain: 27,
            psg_volume: PsgVolume::Mid,
        }
    }
}

impl MsxConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MsxConfig::default();
        assert_eq!(config.ram_size, 0x10000);
        assert_eq!(config.color_mode, ColorMode::Rgb565);
        assert_eq!(config.rom_type, 0);
        assert_eq!(config.psg_gain, 27);
        assert_eq!(config.psg_volume, PsgVolume::Mid);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = MsxConfig::from_json(r#"{ "ram_size": 32768, "color_mode": "Rgb555" }"#)
            .unwrap();
        assert_eq!(config.ram_size, 0x8000);
        assert_eq!(config.color_mode, ColorMode::Rgb555);
        assert_eq!(config.psg_gain, 27);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MsxConfig {
            ram_size: 0x4000,
            color_mode: ColorMode::Rgb565Swap,
            rom_type: 6,
            psg_gain: 10,
            psg_volume: PsgVolume::High,
        };
        let json = config.to_json().unwrap();
        assert_eq!(MsxConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json() {
        assert!(MsxConfig::from_json("{ \"ram_size\": \"big\" }").is_err());
    }
}
