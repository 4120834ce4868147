//! MSX1 memory management unit
//!
//! Memory Map:
//! - 4 primary slots, each a full 64KB address space
//! - Primary slot register (port 0xA8): 2 bits per 16KB page
//! - Each slot is tracked as 8 blocks of 8KB, the granularity of MegaROM
//!   bank switching
//!
//! Slot usage:
//! - Slot 0: system BIOS (mapped by the host with [`Mmu::setup`])
//! - Slot 1: cartridge
//! - Slot 2: second cartridge slot (empty)
//! - Slot 3: RAM, filling the top of the slot

use std::sync::Arc;

use emu_core::logging::{log, LogCategory, LogLevel};

use crate::mapper::RomType;
use crate::system::MsxError;

/// Size of one mapping block
pub const BLOCK_SIZE: usize = 0x2000;
/// Battery backed RAM carried by SRAM cartridges
pub const SRAM_SIZE: usize = 0x2000;
/// Bank registers of both cartridge slots at power on, whatever the mapper
pub const POWER_ON_BANKS: [u8; 4] = [0, 1, 2, 3];

const CARTRIDGE_LABEL: &str = "CART";
const EMPTY_LABEL: &str = "(empty)";

/// Where the bytes of a block come from
#[derive(Debug, Clone)]
enum Backing {
    /// Unmapped, reads 0xFF
    Empty,
    /// Offset into system RAM
    Ram(usize),
    /// The cartridge SRAM
    Sram,
    /// Read-only image handed over by the host
    Image { data: Arc<[u8]>, offset: usize },
    /// Offset into the inserted cartridge, chosen by bank switching
    Cartridge(usize),
}

/// One 8KB block descriptor
#[derive(Debug, Clone)]
pub struct Block {
    label: String,
    backing: Backing,
    is_ram: bool,
    is_cartridge: bool,
}

impl Block {
    fn empty() -> Self {
        Self {
            label: EMPTY_LABEL.to_string(),
            backing: Backing::Empty,
            is_ram: false,
            is_cartridge: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_ram(&self) -> bool {
        self.is_ram
    }

    pub fn is_cartridge(&self) -> bool {
        self.is_cartridge
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self.backing, Backing::Empty)
    }
}

#[derive(Debug, Clone)]
struct Cartridge {
    data: Arc<[u8]>,
    rom_type: RomType,
}

impl Cartridge {
    fn bank_count(&self) -> usize {
        self.data.len().div_ceil(BLOCK_SIZE).max(1)
    }
}

/// Slot and bank registers (the `MMU` snapshot chunk)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MmuContext {
    /// Slot selected for each 16KB page
    pub primary: [u8; 4],
    reserved: [u8; 4],
    /// Bank registers of slot 1 and slot 2
    pub banks: [[u8; 4]; 2],
    /// SRAM overlay flag per 8KB block
    pub sram_select: [u8; 8],
}

impl MmuContext {
    pub const ENCODED_LEN: usize = 24;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(&self.primary);
        out.extend_from_slice(&self.reserved);
        out.extend_from_slice(&self.banks[0]);
        out.extend_from_slice(&self.banks[1]);
        out.extend_from_slice(&self.sram_select);
        out
    }

    /// Missing trailing bytes keep their current values.
    pub fn load_bytes(&mut self, data: &[u8]) {
        let mut buf = self.to_bytes();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        for (page, value) in self.primary.iter_mut().zip(&buf[0..4]) {
            *page = value & 0x03;
        }
        self.reserved.copy_from_slice(&buf[4..8]);
        self.banks[0].copy_from_slice(&buf[8..12]);
        self.banks[1].copy_from_slice(&buf[12..16]);
        self.sram_select.copy_from_slice(&buf[16..24]);
    }
}

/// MSX1 memory management unit
pub struct Mmu {
    slots: [[Block; 8]; 4],
    cartridge: Option<Cartridge>,
    ctx: MmuContext,
    ram: Vec<u8>,
    sram: Vec<u8>,
}

impl Mmu {
    /// Create an MMU with `ram_size` bytes of RAM in slot 3
    pub fn new(ram_size: usize) -> Result<Self, MsxError> {
        let mut mmu = Self {
            slots: std::array::from_fn(|_| std::array::from_fn(|_| Block::empty())),
            cartridge: None,
            ctx: MmuContext::default(),
            ram: Vec::new(),
            sram: Vec::new(),
        };
        mmu.setup_ram(ram_size)?;
        mmu.reset();
        Ok(mmu)
    }

    /// Map RAM into the top of slot 3. Smaller sizes start at a higher
    /// block and mirror within their size.
    pub fn setup_ram(&mut self, size: usize) -> Result<(), MsxError> {
        let first = match size {
            0x2000 | 0x4000 => 6,
            0x8000 => 4,
            0x10000 => 0,
            _ => return Err(MsxError::InvalidRamSize(size)),
        };
        self.ram = vec![0; size];
        for (i, block) in self.slots[3].iter_mut().enumerate() {
            *block = if i < first {
                Block::empty()
            } else {
                Block {
                    label: "RAM".to_string(),
                    backing: Backing::Ram((i * BLOCK_SIZE) & (size - 1)),
                    is_ram: true,
                    is_cartridge: false,
                }
            };
        }
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("MMU: {}KB RAM from block {} of slot 3", size / 1024, first)
        });
        Ok(())
    }

    /// Power-on state: page 0 everywhere, RAM cleared, bank registers at
    /// [`POWER_ON_BANKS`]. SRAM keeps its contents.
    pub fn reset(&mut self) {
        self.ctx = MmuContext::default();
        self.ram.fill(0);
        self.ctx.banks = [POWER_ON_BANKS; 2];
        self.bank_switchover();
    }

    /// Map a read-only image at 8KB granularity starting at `block`.
    ///
    /// Labels are truncated to 4 characters; only the exact label `CART`
    /// marks the blocks as cartridge-backed (subject to bank switching).
    pub fn setup(
        &mut self,
        slot: usize,
        block: usize,
        data: Arc<[u8]>,
        label: Option<&str>,
    ) -> Result<(), MsxError> {
        let size = data.len();
        self.map_blocks(slot, block, data, size, label)
    }

    fn map_blocks(
        &mut self,
        slot: usize,
        block: usize,
        data: Arc<[u8]>,
        size: usize,
        label: Option<&str>,
    ) -> Result<(), MsxError> {
        if slot >= 4 || block >= 8 {
            return Err(MsxError::InvalidSlot { slot, block });
        }
        let short_label: String = label.unwrap_or_default().chars().take(4).collect();
        let is_cartridge = label == Some(CARTRIDGE_LABEL);
        let count = size.div_ceil(BLOCK_SIZE).max(1);

        for (n, entry) in self.slots[slot][block..].iter_mut().take(count).enumerate() {
            *entry = Block {
                label: short_label.clone(),
                backing: Backing::Image {
                    data: Arc::clone(&data),
                    offset: n * BLOCK_SIZE,
                },
                is_ram: false,
                is_cartridge,
            };
        }
        self.bank_switchover();
        Ok(())
    }

    /// Insert a cartridge into slot 1 starting at 0x4000.
    ///
    /// 16KB and smaller images occupy one 16KB window (Normal images are
    /// mirrored into 0x8000), larger ones the 32KB window 0x4000-0xBFFF.
    pub fn setup_cartridge(&mut self, data: Arc<[u8]>, rom_type: RomType) -> Result<(), MsxError> {
        let size = data.len();
        self.cartridge = Some(Cartridge {
            data: Arc::clone(&data),
            rom_type,
        });
        let window = if size < 0x8000 { 0x4000 } else { 0x8000 };
        self.map_blocks(1, 2, Arc::clone(&data), window, Some(CARTRIDGE_LABEL))?;
        if rom_type == RomType::Normal && size == 0x4000 {
            self.map_blocks(1, 4, data, 0x4000, Some("CART/M"))?;
        }

        self.sram = if rom_type.has_sram() {
            vec![0; SRAM_SIZE]
        } else {
            Vec::new()
        };
        self.ctx.banks[0] = POWER_ON_BANKS;
        self.bank_switchover();

        log(LogCategory::Bus, LogLevel::Info, || {
            format!(
                "MMU: cartridge {:?} {}KB, {} banks{}",
                rom_type,
                size / 1024,
                size.div_ceil(BLOCK_SIZE),
                if rom_type.has_sram() { ", 8KB SRAM" } else { "" }
            )
        });
        Ok(())
    }

    /// Remove the cartridge and empty slots 1 and 2.
    pub fn clear_cartridge(&mut self) {
        self.cartridge = None;
        self.sram = Vec::new();
        self.ctx.banks = [[0; 4]; 2];
        self.ctx.sram_select = [0; 8];
        self.clear_slot(1);
        self.clear_slot(2);
        log(LogCategory::Bus, LogLevel::Info, || "MMU: cartridge ejected".to_string());
    }

    /// Unmap every block of `slot`. Out of range slots are ignored.
    pub fn clear_slot(&mut self, slot: usize) {
        if let Some(blocks) = self.slots.get_mut(slot) {
            *blocks = std::array::from_fn(|_| Block::empty());
        }
    }

    /// Re-resolve every cartridge block of slots 1 and 2 from the bank
    /// registers and SRAM overlay flags.
    pub fn bank_switchover(&mut self) {
        let bank_count = self.cartridge.as_ref().map_or(1, Cartridge::bank_count);
        let has_sram = !self.sram.is_empty();
        for slot in 1..=2 {
            for first in [2, 4] {
                if !self.slots[slot][first].is_cartridge {
                    continue;
                }
                for block in first..first + 2 {
                    let entry = &mut self.slots[slot][block];
                    if has_sram && self.ctx.sram_select[block] != 0 {
                        entry.backing = Backing::Sram;
                        entry.is_ram = true;
                    } else {
                        let bank = self.ctx.banks[slot - 1][block - 2] as usize % bank_count;
                        entry.backing = Backing::Cartridge(bank * BLOCK_SIZE);
                        entry.is_ram = false;
                    }
                }
            }
        }
    }

    #[inline]
    fn slot_of(&self, addr: u16) -> usize {
        self.ctx.primary[(addr >> 14) as usize] as usize
    }

    #[inline]
    fn block_of(&self, addr: u16) -> &Block {
        &self.slots[self.slot_of(addr)][addr as usize / BLOCK_SIZE]
    }

    /// Read a byte through the current slot and bank mapping
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        let offset = addr as usize & (BLOCK_SIZE - 1);
        match &self.block_of(addr).backing {
            Backing::Empty => 0xFF,
            Backing::Ram(base) => self.ram[base + offset],
            Backing::Sram => self.sram.get(offset).copied().unwrap_or(0xFF),
            Backing::Image { data, offset: base } => {
                data.get(base + offset).copied().unwrap_or(0xFF)
            }
            Backing::Cartridge(base) => self
                .cartridge
                .as_ref()
                .and_then(|cart| cart.data.get(base + offset).copied())
                .unwrap_or(0xFF),
        }
    }

    /// Write a byte. RAM blocks store it, cartridge blocks forward it to
    /// the mapper, anything else drops it.
    pub fn write(&mut self, addr: u16, value: u8) {
        let slot = self.slot_of(addr);
        let offset = addr as usize & (BLOCK_SIZE - 1);
        let block = &self.slots[slot][addr as usize / BLOCK_SIZE];

        if block.is_ram {
            match block.backing {
                Backing::Ram(base) => self.ram[base + offset] = value,
                Backing::Sram => {
                    if let Some(byte) = self.sram.get_mut(offset) {
                        *byte = value;
                    }
                }
                _ => {}
            }
            return;
        }

        if block.is_cartridge && (1..=2).contains(&slot) {
            if let Some(rom_type) = self.cartridge.as_ref().map(|c| c.rom_type) {
                let ctx = &mut self.ctx;
                if rom_type.write(&mut ctx.banks[slot - 1], &mut ctx.sram_select, addr, value) {
                    log(LogCategory::Bus, LogLevel::Debug, || {
                        format!(
                            "MMU: {:?} write {:04X}={:02X} banks {:?} sram {:?}",
                            rom_type,
                            addr,
                            value,
                            ctx.banks[slot - 1],
                            &ctx.sram_select[4..6]
                        )
                    });
                    self.bank_switchover();
                }
                return;
            }
        }

        log(LogCategory::Bus, LogLevel::Trace, || {
            format!("MMU: discarded write {:04X}={:02X} (slot {})", addr, value, slot)
        });
    }

    /// Primary slot register as read from port 0xA8
    pub fn primary(&self) -> u8 {
        self.ctx
            .primary
            .iter()
            .rev()
            .fold(0, |acc, &slot| (acc << 2) | slot)
    }

    /// Port 0xA8 write
    pub fn set_primary(&mut self, value: u8) {
        for (page, slot) in self.ctx.primary.iter_mut().enumerate() {
            *slot = (value >> (page * 2)) & 0x03;
        }
    }

    pub fn context(&self) -> &MmuContext {
        &self.ctx
    }

    /// Restore slot/bank registers and rebuild the block mappings
    pub fn set_context(&mut self, data: &[u8]) {
        self.ctx.load_bytes(data);
        self.bank_switchover();
    }

    pub fn block(&self, slot: usize, block: usize) -> Option<&Block> {
        self.slots.get(slot)?.get(block)
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Copy as much of `data` as fits into RAM
    pub fn load_ram(&mut self, data: &[u8]) {
        let n = data.len().min(self.ram.len());
        self.ram[..n].copy_from_slice(&data[..n]);
    }

    /// Cartridge SRAM, empty when the cartridge has none
    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn load_sram(&mut self, data: &[u8]) {
        let n = data.len().min(self.sram.len());
        self.sram[..n].copy_from_slice(&data[..n]);
    }

    pub fn has_cartridge(&self) -> bool {
        self.cartridge.is_some()
    }

    pub fn rom_type(&self) -> Option<RomType> {
        self.cartridge.as_ref().map(|c| c.rom_type)
    }
}
