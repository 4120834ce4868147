//! MegaROM bank switching protocols
//!
//! Every protocol works on the same four 8KB bank registers that cover
//! 0x4000-0xBFFF of the cartridge slot. A register holds a bank index into
//! the cartridge image; the MMU turns indices into block mappings.

use crate::system::MsxError;
use serde::{Deserialize, Serialize};

/// Cartridge mapper declared by the host when loading an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RomType {
    /// Plain 16KB/32KB ROM, no runtime switching
    #[default]
    Normal,
    Asc8,
    Asc8Sram2,
    Asc16,
    Asc16Sram2,
    Konami,
}

impl TryFrom<u8> for RomType {
    type Error = MsxError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RomType::Normal),
            1 => Ok(RomType::Asc8),
            2 => Ok(RomType::Asc8Sram2),
            3 => Ok(RomType::Asc16),
            4 => Ok(RomType::Asc16Sram2),
            6 => Ok(RomType::Konami),
            _ => Err(MsxError::UnknownRomType(code)),
        }
    }
}

impl From<RomType> for u8 {
    fn from(rom_type: RomType) -> u8 {
        match rom_type {
            RomType::Normal => 0,
            RomType::Asc8 => 1,
            RomType::Asc8Sram2 => 2,
            RomType::Asc16 => 3,
            RomType::Asc16Sram2 => 4,
            RomType::Konami => 6,
        }
    }
}

impl RomType {
    /// Cartridge carries 8KB of battery backed RAM
    pub fn has_sram(self) -> bool {
        matches!(self, RomType::Asc8Sram2 | RomType::Asc16Sram2)
    }

    /// Apply a write to a cartridge block.
    ///
    /// `banks` are the four bank registers of the slot and `sram_select` the
    /// per-block SRAM overlay flags. Returns true when a mapping changed and
    /// the MMU must switch banks.
    pub fn write(self, banks: &mut [u8; 4], sram_select: &mut [u8; 8], addr: u16, value: u8) -> bool {
        match self {
            RomType::Normal => false,
            RomType::Asc8 => asc8(banks, addr, value),
            RomType::Asc8Sram2 => {
                if matches!(addr & 0x7800, 0x7000 | 0x7800) {
                    let select = (value & 0xF0 != 0) as u8;
                    sram_select[4] = select;
                    sram_select[5] = select;
                }
                asc8(banks, addr, value & 0x0F);
                true
            }
            RomType::Asc16 => asc16(banks, addr, value),
            RomType::Asc16Sram2 => {
                if (0x7000..0x7800).contains(&addr) {
                    let select = (value & 0x10 != 0) as u8;
                    sram_select[4] = select;
                    sram_select[5] = select;
                }
                asc16(banks, addr, value & 0x0F);
                true
            }
            RomType::Konami => konami(banks, addr, value),
        }
    }
}

fn asc8(banks: &mut [u8; 4], addr: u16, value: u8) -> bool {
    let reg = match addr & 0x7800 {
        0x6000 => 0,
        0x6800 => 1,
        0x7000 => 2,
        0x7800 => 3,
        _ => return false,
    };
    banks[reg] = value;
    true
}

fn asc16(banks: &mut [u8; 4], addr: u16, value: u8) -> bool {
    let first = match addr {
        0x6000..=0x67FF => 0,
        0x7000..=0x77FF => 2,
        _ => return false,
    };
    banks[first] = value.wrapping_mul(2);
    banks[first + 1] = value.wrapping_mul(2).wrapping_add(1);
    true
}

fn konami(banks: &mut [u8; 4], addr: u16, value: u8) -> bool {
    // Bank 0 is fixed
    let reg = match addr & 0xF000 {
        0x6000 | 0x7000 => 1,
        0x8000 | 0x9000 => 2,
        0xA000 | 0xB000 => 3,
        _ => return false,
    };
    banks[reg] = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_type_codes() {
        for code in [0u8, 1, 2, 3, 4, 6] {
            let rom_type = RomType::try_from(code).unwrap();
            assert_eq!(u8::from(rom_type), code);
        }
        assert!(matches!(
            RomType::try_from(5),
            Err(MsxError::UnknownRomType(5))
        ));
        assert!(RomType::try_from(0xFF).is_err());
    }

    #[test]
    fn test_normal_ignores_writes() {
        let mut banks = [0, 1, 2, 3];
        let mut sram = [0; 8];
        assert!(!RomType::Normal.write(&mut banks, &mut sram, 0x6000, 5));
        assert_eq!(banks, [0, 1, 2, 3]);
    }

    #[test]
    fn test_asc8_windows() {
        let mut banks = [0; 4];
        let mut sram = [0; 8];
        RomType::Asc8.write(&mut banks, &mut sram, 0x6000, 1);
        RomType::Asc8.write(&mut banks, &mut sram, 0x6FFF, 2);
        RomType::Asc8.write(&mut banks, &mut sram, 0x7000, 3);
        RomType::Asc8.write(&mut banks, &mut sram, 0x7800, 4);
        assert_eq!(banks, [1, 2, 3, 4]);
        // 0x4000-0x5FFF is not a bank register
        assert!(!RomType::Asc8.write(&mut banks, &mut sram, 0x5000, 9));
    }

    #[test]
    fn test_asc16_pairs() {
        let mut banks = [0; 4];
        let mut sram = [0; 8];
        RomType::Asc16.write(&mut banks, &mut sram, 0x6000, 3);
        assert_eq!(banks, [6, 7, 0, 0]);
        RomType::Asc16.write(&mut banks, &mut sram, 0x77FF, 1);
        assert_eq!(banks, [6, 7, 2, 3]);
        // 0x6800 and 0x7800 windows are unused
        assert!(!RomType::Asc16.write(&mut banks, &mut sram, 0x6800, 5));
        assert!(!RomType::Asc16.write(&mut banks, &mut sram, 0x7800, 5));
    }

    #[test]
    fn test_konami_bank_zero_fixed() {
        let mut banks = [0, 1, 2, 3];
        let mut sram = [0; 8];
        RomType::Konami.write(&mut banks, &mut sram, 0x6000, 10);
        RomType::Konami.write(&mut banks, &mut sram, 0x9FFF, 11);
        RomType::Konami.write(&mut banks, &mut sram, 0xB000, 12);
        assert_eq!(banks, [0, 10, 11, 12]);
        assert!(!RomType::Konami.write(&mut banks, &mut sram, 0x4000, 1));
    }

    #[test]
    fn test_asc8_sram_select() {
        let mut banks = [0; 4];
        let mut sram = [0; 8];
        RomType::Asc8Sram2.write(&mut banks, &mut sram, 0x7000, 0x13);
        assert_eq!(sram[4..6], [1, 1]);
        assert_eq!(banks[2], 3);

        // Page 1 windows leave the overlay alone
        RomType::Asc8Sram2.write(&mut banks, &mut sram, 0x6000, 0x02);
        assert_eq!(sram[4..6], [1, 1]);
        assert_eq!(banks[0], 2);

        RomType::Asc8Sram2.write(&mut banks, &mut sram, 0x7800, 0x05);
        assert_eq!(sram[4..6], [0, 0]);
        assert_eq!(banks[3], 5);
    }

    #[test]
    fn test_asc16_sram_select() {
        let mut banks = [0; 4];
        let mut sram = [0; 8];
        RomType::Asc16Sram2.write(&mut banks, &mut sram, 0x7000, 0x10);
        assert_eq!(sram[4..6], [1, 1]);
        assert_eq!(banks, [0, 0, 0, 1]);

        RomType::Asc16Sram2.write(&mut banks, &mut sram, 0x7000, 0x02);
        assert_eq!(sram[4..6], [0, 0]);
        assert_eq!(banks, [0, 0, 4, 5]);
    }
}
