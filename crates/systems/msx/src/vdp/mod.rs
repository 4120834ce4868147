//! TMS9918A Video Display Processor
//!
//! # Features
//! - 256×192 active display inside a 342×262 clock grid
//! - 16 KB of private VRAM reached through a data/address port pair
//! - Graphic 1 (screen 1) and Graphic 2 (screen 2) background modes
//! - 32 sprites, 4 visible per scanline, 5th sprite and collision status
//! - Vertical blank interrupt
//!
//! Text and multicolor modes are not rendered; lines in those modes show
//! the backdrop color.
//!
//! # Timing
//! The horizontal counter runs 0..342 and the vertical counter 0..262.
//! Lines 27..219 of the grid carry the active display (after 3 lines of
//! top border skip and 24 lines of visible border). A line is drawn when
//! the horizontal counter reaches 308, the end of the active area plus the
//! left border. Vertical blank starts at line 238; line 262 wraps to 0 and
//! ends the frame.

mod sprites;

use emu_core::graphics::{ColorMode, ColorOps};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::renderer::Renderer;
use emu_core::types::Frame;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 192;
pub const VRAM_SIZE: usize = 0x4000;

/// Horizontal steps per line
pub const H_TOTAL: i32 = 342;
/// Lines per frame
pub const V_TOTAL: i32 = 262;
/// VDP steps in one frame
pub const STEPS_PER_FRAME: u32 = (H_TOTAL * V_TOTAL) as u32;

const ACTIVE_TOP: i32 = 27;
const RENDER_H: i32 = 24 + 284;
const BLANK_LINE: i32 = 238;

const VRAM_MASK: usize = VRAM_SIZE - 1;

/// Status register bits
pub const STATUS_BLANK: u8 = 0x80;
pub const STATUS_FIFTH_SPRITE: u8 = 0x40;
pub const STATUS_COLLISION: u8 = 0x20;

/// TMS9918A color table in RGB888
pub const PALETTE_RGB888: [u32; 16] = [
    0x000000, 0x000000, 0x3EB849, 0x74D07D, 0x5955E0, 0x8076F1, 0xB95E51, 0x65DBEF, 0xDB6559,
    0xFF897D, 0xCCC35E, 0xDED087, 0x3AA241, 0xB766B5, 0xCCCCCC, 0xFFFFFF,
];

/// Called after each rendered line with (frame, line, pixels)
pub type LineCallback = Box<dyn FnMut(u16, usize, &[u16]) + Send>;

/// Notifications raised while the VDP runs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VdpEvents {
    /// Vertical blank with interrupts enabled
    pub blank: bool,
    /// Frame boundary crossed
    pub frame_break: bool,
}

impl VdpEvents {
    fn merge(&mut self, other: VdpEvents) {
        self.blank |= other.blank;
        self.frame_break |= other.frame_break;
    }
}

/// Display mode selected by registers 0 and 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Screen 1: 32×24 tiles, one color pair per 8 patterns
    Graphic1,
    /// Screen 0: 40×24 text
    Text,
    /// Screen 2: 32×24 tiles, three pattern/color banks
    Graphic2,
    /// Screen 3: 4×4 color blocks
    Multicolor,
}

/// Everything the VDP needs to resume (the `VDP` snapshot chunk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdpContext {
    pub count_h: i32,
    pub count_v: i32,
    pub frame: i32,
    pub rendering_line: bool,
    pub ram: Vec<u8>,
    pub reg: [u8; 8],
    pub tmp_addr: [u8; 2],
    pub addr: u16,
    pub write_addr: u16,
    pub stat: u8,
    /// Address port phase, always 0 or 1 between writes
    pub latch: u8,
    pub read_buffer: u8,
}

impl Default for VdpContext {
    fn default() -> Self {
        Self {
            count_h: 0,
            count_v: 0,
            frame: 0,
            rendering_line: false,
            ram: vec![0; VRAM_SIZE],
            reg: [0; 8],
            tmp_addr: [0; 2],
            addr: 0,
            write_addr: 0,
            stat: 0,
            latch: 0,
            read_buffer: 0,
        }
    }
}

impl VdpContext {
    pub const ENCODED_LEN: usize = 16 + VRAM_SIZE + 8 + 2 + 2 + 2 + 4;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(&self.count_h.to_le_bytes());
        out.extend_from_slice(&self.count_v.to_le_bytes());
        out.extend_from_slice(&self.frame.to_le_bytes());
        out.extend_from_slice(&(self.rendering_line as i32).to_le_bytes());
        out.extend_from_slice(&self.ram);
        out.extend_from_slice(&self.reg);
        out.extend_from_slice(&self.tmp_addr);
        out.extend_from_slice(&self.addr.to_le_bytes());
        out.extend_from_slice(&self.write_addr.to_le_bytes());
        out.push(self.stat);
        out.push(self.latch);
        out.push(self.read_buffer);
        out.push(0);
        out
    }

    /// Missing trailing bytes keep their current values. Counters are
    /// folded back into the timing grid.
    pub fn load_bytes(&mut self, data: &[u8]) {
        let mut buf = self.to_bytes();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        let int = |at: usize| i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        self.count_h = int(0);
        self.count_v = int(4);
        self.frame = int(8) & 0xFFFF;
        self.rendering_line = int(12) != 0;

        let mut at = 16;
        self.ram.copy_from_slice(&buf[at..at + VRAM_SIZE]);
        at += VRAM_SIZE;
        self.reg.copy_from_slice(&buf[at..at + 8]);
        at += 8;
        self.tmp_addr.copy_from_slice(&buf[at..at + 2]);
        at += 2;
        self.addr = u16::from_le_bytes([buf[at], buf[at + 1]]);
        self.write_addr = u16::from_le_bytes([buf[at + 2], buf[at + 3]]);
        at += 4;
        self.stat = buf[at];
        self.latch = buf[at + 1];
        self.read_buffer = buf[at + 2];
        self.normalize();
    }

    /// Fold counters back into the 342x262 grid and clamp the address
    /// registers and latch phase to their hardware widths.
    fn normalize(&mut self) {
        self.ram.resize(VRAM_SIZE, 0);
        self.count_h = self.count_h.rem_euclid(H_TOTAL);
        self.count_v = self.count_v.rem_euclid(V_TOTAL);
        self.addr &= VRAM_MASK as u16;
        self.write_addr &= VRAM_MASK as u16;
        self.latch &= 1;
    }
}

/// Table addresses and flags derived from the registers
#[derive(Debug, Clone, Copy)]
struct AddressCache {
    mode: DisplayMode,
    screen_enabled: bool,
    interrupt_enabled: bool,
    sprite_size: usize,
    sprite_mag: usize,
    name_table: usize,
    color_table: usize,
    color_table_g2: usize,
    color_mask: usize,
    pattern_table: usize,
    pattern_table_g2: usize,
    pattern_mask: usize,
    sprite_attributes: usize,
    sprite_patterns: usize,
    backdrop: usize,
}

impl AddressCache {
    fn from_registers(reg: &[u8; 8]) -> Self {
        let mode = if reg[1] & 0x10 != 0 {
            DisplayMode::Text
        } else if reg[0] & 0x02 != 0 {
            DisplayMode::Graphic2
        } else if reg[1] & 0x08 != 0 {
            DisplayMode::Multicolor
        } else {
            DisplayMode::Graphic1
        };
        Self {
            mode,
            screen_enabled: reg[1] & 0x40 != 0,
            interrupt_enabled: reg[1] & 0x20 != 0,
            sprite_size: if reg[1] & 0x02 != 0 { 16 } else { 8 },
            sprite_mag: if reg[1] & 0x01 != 0 { 2 } else { 1 },
            name_table: ((reg[2] & 0x0F) as usize) << 10,
            color_table: (reg[3] as usize) << 6,
            color_table_g2: ((reg[3] & 0x80) as usize) << 6,
            color_mask: (((reg[3] & 0x7F) as usize) << 3) | 0x07,
            pattern_table: ((reg[4] & 0x07) as usize) << 11,
            pattern_table_g2: ((reg[4] & 0x04) as usize) << 11,
            pattern_mask: (((reg[4] & 0x03) as usize) << 8) | 0xFF,
            sprite_attributes: ((reg[5] & 0x7F) as usize) << 7,
            sprite_patterns: ((reg[6] & 0x07) as usize) << 11,
            backdrop: (reg[7] & 0x0F) as usize,
        }
    }
}

/// TMS9918A state and rendering
pub struct Vdp {
    ctx: VdpContext,
    cache: AddressCache,
    palette: [u16; 16],
    color_mode: ColorMode,
    frame: Frame,
    line_callback: Option<LineCallback>,
}

impl Vdp {
    /// Create a VDP with its own zeroed context
    pub fn new(color_mode: ColorMode) -> Self {
        Self::with_context(color_mode, VdpContext::default())
    }

    /// Create a VDP around an existing context (e.g. VRAM prepared by the
    /// host). Counters and latches are folded into range the same way a
    /// loaded snapshot is; call [`Vdp::reset`] to clear it.
    pub fn with_context(color_mode: ColorMode, mut ctx: VdpContext) -> Self {
        ctx.normalize();
        let cache = AddressCache::from_registers(&ctx.reg);
        Self {
            ctx,
            cache,
            palette: color_mode.pack_palette(&PALETTE_RGB888),
            color_mode,
            frame: Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32),
            line_callback: None,
        }
    }

    pub fn set_line_callback(&mut self, callback: Option<LineCallback>) {
        self.line_callback = callback;
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn context(&self) -> &VdpContext {
        &self.ctx
    }

    /// Restore a context snapshot and re-derive cached register state
    pub fn set_context(&mut self, data: &[u8]) {
        self.ctx.load_bytes(data);
        self.refresh();
    }

    pub fn vram(&self) -> &[u8] {
        &self.ctx.ram
    }

    pub fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.ctx.ram
    }

    pub fn registers(&self) -> &[u8; 8] {
        &self.ctx.reg
    }

    pub fn status(&self) -> u8 {
        self.ctx.stat
    }

    pub fn mode(&self) -> DisplayMode {
        self.cache.mode
    }

    pub fn frame_count(&self) -> u16 {
        self.ctx.frame as u16
    }

    /// Packed backdrop color, byte swapped on request
    pub fn backdrop_color(&self, swap: bool) -> u16 {
        let color = self.palette[self.cache.backdrop];
        if swap {
            ColorOps::swap16(color)
        } else {
            color
        }
    }

    /// Re-derive every cached register value
    pub fn refresh(&mut self) {
        self.cache = AddressCache::from_registers(&self.ctx.reg);
    }

    /// Advance the timing grid by `steps` VDP clocks
    pub fn tick(&mut self, steps: u32) -> VdpEvents {
        let mut events = VdpEvents::default();
        for _ in 0..steps {
            self.ctx.count_h += 1;
            if self.ctx.rendering_line && self.ctx.count_h == RENDER_H {
                self.render_scanline(self.ctx.count_v - ACTIVE_TOP);
            }
            if self.ctx.count_h != H_TOTAL {
                continue;
            }
            self.ctx.count_h = 0;
            self.ctx.count_v += 1;
            self.ctx.rendering_line =
                (ACTIVE_TOP..ACTIVE_TOP + SCREEN_HEIGHT as i32).contains(&self.ctx.count_v);
            if self.ctx.count_v == BLANK_LINE {
                self.ctx.stat |= STATUS_BLANK;
                if self.cache.interrupt_enabled {
                    log(LogCategory::Interrupts, LogLevel::Trace, || {
                        format!("VDP: vblank IRQ frame {}", self.ctx.frame)
                    });
                    events.blank = true;
                }
            } else if self.ctx.count_v == V_TOTAL {
                self.ctx.count_v = 0;
                self.ctx.frame = (self.ctx.frame + 1) & 0xFFFF;
                events.frame_break = true;
            }
        }
        events
    }

    /// Port 0x98 read
    pub fn read_data(&mut self) -> u8 {
        let result = self.ctx.read_buffer;
        self.read_ahead();
        self.ctx.latch = 0;
        result
    }

    /// Port 0x99 read. Returns the status and clears blank, 5th sprite
    /// and collision flags.
    pub fn read_status(&mut self) -> u8 {
        let result = self.ctx.stat;
        self.ctx.stat &= 0x1F;
        self.ctx.latch = 0;
        result
    }

    /// Port 0x98 write
    pub fn write_data(&mut self, value: u8) {
        self.ctx.addr &= VRAM_MASK as u16;
        self.ctx.read_buffer = value;
        self.ctx.write_addr = self.ctx.addr;
        self.ctx.addr += 1;
        self.ctx.ram[self.ctx.write_addr as usize] = value;
        self.ctx.latch = 0;
    }

    /// Port 0x99 write
    ///
    /// Bytes are collected in pairs. The second byte selects a register
    /// write (bit 7), a write address (bit 6) or a read address with
    /// read-ahead (neither).
    pub fn write_address(&mut self, value: u8) -> VdpEvents {
        self.ctx.latch &= 1;
        self.ctx.tmp_addr[self.ctx.latch as usize] = value;
        if self.ctx.latch == 0 {
            self.ctx.latch = 1;
            self.ctx.addr = (self.ctx.addr & 0xFF00) | value as u16;
            return VdpEvents::default();
        }
        self.ctx.latch = 0;

        let [low, high] = self.ctx.tmp_addr;
        if high & 0x80 != 0 {
            self.write_register(high & 0x07, low)
        } else {
            self.ctx.addr = u16::from_le_bytes([low, high]) & VRAM_MASK as u16;
            if high & 0x40 == 0 {
                self.read_ahead();
            }
            VdpEvents::default()
        }
    }

    fn write_register(&mut self, index: u8, value: u8) -> VdpEvents {
        let previous = self.cache;
        self.ctx.reg[index as usize] = value;
        self.refresh();
        log(LogCategory::Video, LogLevel::Trace, || {
            format!("VDP: R#{} = {:02X}", index, value)
        });
        if previous.mode != self.cache.mode {
            log(LogCategory::Video, LogLevel::Debug, || {
                format!("VDP: mode {:?} -> {:?}", previous.mode, self.cache.mode)
            });
            if !matches!(self.cache.mode, DisplayMode::Graphic1 | DisplayMode::Graphic2) {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("VDP: {:?} mode is not rendered", self.cache.mode)
                });
            }
        }

        let mut events = VdpEvents::default();
        if !previous.interrupt_enabled
            && self.cache.interrupt_enabled
            && self.ctx.stat & STATUS_BLANK != 0
        {
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                "VDP: IRQ on interrupt enable during blank".to_string()
            });
            events.merge(VdpEvents {
                blank: true,
                frame_break: false,
            });
        }
        events
    }

    fn read_ahead(&mut self) {
        self.ctx.addr &= VRAM_MASK as u16;
        self.ctx.read_buffer = self.ctx.ram[self.ctx.addr as usize];
        self.ctx.addr += 1;
    }

    fn render_scanline(&mut self, line: i32) {
        if !(0..SCREEN_HEIGHT as i32).contains(&line) {
            return;
        }
        let line = line as usize;
        let backdrop = self.palette[self.cache.backdrop];

        let Vdp {
            ctx,
            cache,
            palette,
            frame,
            ..
        } = &mut *self;
        let row = frame.row_mut(line);

        match (cache.screen_enabled, cache.mode) {
            (true, DisplayMode::Graphic1) => {
                render_graphic1(&ctx.ram, cache, palette, line, row);
                sprites::render_line(ctx, cache, palette, line, row);
            }
            (true, DisplayMode::Graphic2) => {
                render_graphic2(&ctx.ram, cache, palette, line, row);
                sprites::render_line(ctx, cache, palette, line, row);
            }
            _ => row.fill(backdrop),
        }

        if let Some(callback) = self.line_callback.as_mut() {
            callback(self.ctx.frame as u16, line, self.frame.row(line));
        }
    }
}

/// Draw 8 pixels of a pattern byte with a packed color pair
#[inline]
fn draw_pattern(out: &mut [u16], pattern: u8, color: u8, palette: &[u16; 16], backdrop: usize) {
    let pick = |c: u8| palette[if c == 0 { backdrop } else { c as usize }];
    let fg = pick(color >> 4);
    let bg = pick(color & 0x0F);
    for (bit, pixel) in out.iter_mut().enumerate() {
        *pixel = if pattern & (0x80 >> bit) != 0 { fg } else { bg };
    }
}

fn render_graphic1(
    ram: &[u8],
    cache: &AddressCache,
    palette: &[u16; 16],
    line: usize,
    row: &mut [u16],
) {
    let pixel_line = line % 8;
    let names = cache.name_table + line / 8 * 32;
    for (i, out) in row.chunks_exact_mut(8).enumerate() {
        let name = ram[(names + i) & VRAM_MASK] as usize;
        let pattern = ram[(cache.pattern_table + name * 8 + pixel_line) & VRAM_MASK];
        let color = ram[(cache.color_table + name / 8) & VRAM_MASK];
        draw_pattern(out, pattern, color, palette, cache.backdrop);
    }
}

fn render_graphic2(
    ram: &[u8],
    cache: &AddressCache,
    palette: &[u16; 16],
    line: usize,
    row: &mut [u16],
) {
    let pixel_line = line % 8;
    let names = cache.name_table + line / 8 * 32;
    // Each third of the screen uses its own 256 patterns
    let bank = (line / 64) * 256;
    for (i, out) in row.chunks_exact_mut(8).enumerate() {
        let name = ram[(names + i) & VRAM_MASK] as usize + bank;
        let pattern =
            ram[(cache.pattern_table_g2 + (name & cache.pattern_mask) * 8 + pixel_line) & VRAM_MASK];
        let color =
            ram[(cache.color_table_g2 + (name & cache.color_mask) * 8 + pixel_line) & VRAM_MASK];
        draw_pattern(out, pattern, color, palette, cache.backdrop);
    }
}

impl Renderer for Vdp {
    fn get_frame(&self) -> &Frame {
        &self.frame
    }

    fn clear(&mut self, color: u16) {
        self.frame.pixels.fill(color);
    }

    /// Clear VRAM, registers, counters and the picture
    fn reset(&mut self) {
        self.ctx = VdpContext::default();
        self.refresh();
        self.clear(0);
    }

    fn name(&self) -> &str {
        "TMS9918A"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_register(vdp: &mut Vdp, index: u8, value: u8) -> VdpEvents {
        vdp.write_address(value);
        vdp.write_address(0x80 | index)
    }

    fn set_write_address(vdp: &mut Vdp, addr: u16) {
        vdp.write_address(addr as u8);
        vdp.write_address(0x40 | (addr >> 8) as u8);
    }

    fn fill_vram(vdp: &mut Vdp, addr: usize, bytes: &[u8]) {
        vdp.vram_mut()[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Run until `line` of the active display has been drawn
    fn run_to_line(vdp: &mut Vdp, line: i32) {
        let target = (ACTIVE_TOP + line) * H_TOTAL + RENDER_H;
        let now = vdp.ctx.count_v * H_TOTAL + vdp.ctx.count_h;
        vdp.tick((target - now) as u32);
    }

    #[test]
    fn test_vdp_creation() {
        let vdp = Vdp::new(ColorMode::Rgb565);
        assert_eq!(vdp.get_frame().width, 256);
        assert_eq!(vdp.get_frame().height, 192);
        assert_eq!(vdp.vram().len(), VRAM_SIZE);
        assert_eq!(vdp.mode(), DisplayMode::Graphic1);
        assert_eq!(vdp.name(), "TMS9918A");
    }

    #[test]
    fn test_register_write() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 7, 0xF4);
        assert_eq!(vdp.registers()[7], 0xF4);
        assert_eq!(vdp.ctx.latch, 0);
        // Index is taken modulo 8
        write_register(&mut vdp, 0x0F, 0x12);
        assert_eq!(vdp.registers()[7], 0x12);
    }

    #[test]
    fn test_read_address_preloads_buffer() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.vram_mut()[0x1234] = 0xAB;
        vdp.vram_mut()[0x1235] = 0xCD;

        vdp.write_address(0x34);
        assert_eq!(vdp.ctx.latch, 1);
        vdp.write_address(0x12);

        assert_eq!(vdp.ctx.read_buffer, 0xAB);
        assert_eq!(vdp.ctx.addr, 0x1235);
        assert_eq!(vdp.read_data(), 0xAB);
        assert_eq!(vdp.read_data(), 0xCD);
    }

    #[test]
    fn test_first_address_byte_updates_low_half() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.ctx.addr = 0x2100;
        vdp.write_address(0x55);
        assert_eq!(vdp.ctx.addr, 0x2155);
    }

    #[test]
    fn test_write_data_sequence() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        set_write_address(&mut vdp, 0x3FFF);
        vdp.write_data(0x11);
        vdp.write_data(0x22);
        assert_eq!(vdp.vram()[0x3FFF], 0x11);
        // Address wraps inside 16KB
        assert_eq!(vdp.vram()[0x0000], 0x22);
        assert_eq!(vdp.ctx.write_addr, 0x0000);
        assert_eq!(vdp.ctx.read_buffer, 0x22);
    }

    #[test]
    fn test_data_access_resets_latch() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.write_address(0x00);
        vdp.read_data();
        assert_eq!(vdp.ctx.latch, 0);
        vdp.write_address(0x00);
        vdp.write_data(0);
        assert_eq!(vdp.ctx.latch, 0);
    }

    #[test]
    fn test_status_read_clears_flags() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.ctx.stat = STATUS_BLANK | STATUS_FIFTH_SPRITE | STATUS_COLLISION | 0x07;
        vdp.ctx.latch = 1;
        assert_eq!(vdp.read_status(), 0xE7);
        assert_eq!(vdp.ctx.latch, 0);
        assert_eq!(vdp.read_status(), 0x07);
        assert_eq!(vdp.read_status() & 0xE0, 0);
    }

    #[test]
    fn test_one_frame_of_steps() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 1, 0x60);
        let events = vdp.tick(STEPS_PER_FRAME);
        assert!(events.blank);
        assert!(events.frame_break);
        assert_eq!(vdp.frame_count(), 1);
        assert_eq!((vdp.ctx.count_h, vdp.ctx.count_v), (0, 0));
        assert_ne!(vdp.status() & STATUS_BLANK, 0);
    }

    #[test]
    fn test_blank_without_interrupt_enable() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        let events = vdp.tick(BLANK_LINE as u32 * H_TOTAL as u32);
        assert!(!events.blank);
        assert_ne!(vdp.status() & STATUS_BLANK, 0);

        // Enabling interrupts during blank fires immediately
        let events = write_register(&mut vdp, 1, 0x20);
        assert!(events.blank);
        // Already enabled: no second notification
        let events = write_register(&mut vdp, 1, 0x60);
        assert!(!events.blank);
    }

    #[test]
    fn test_frame_counter_wraps() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.ctx.frame = 0xFFFF;
        vdp.tick(STEPS_PER_FRAME);
        assert_eq!(vdp.frame_count(), 0);
    }

    #[test]
    fn test_disabled_screen_draws_backdrop() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 7, 0x04);
        run_to_line(&mut vdp, 10);
        let blue = ColorMode::Rgb565.pack(PALETTE_RGB888[4]);
        assert!(vdp.get_frame().row(10).iter().all(|&p| p == blue));
        assert_eq!(vdp.backdrop_color(false), blue);
        assert_eq!(vdp.backdrop_color(true), ColorOps::swap16(blue));
    }

    #[test]
    fn test_unsupported_mode_draws_backdrop() {
        let mut vdp = Vdp::new(ColorMode::Rgb555);
        write_register(&mut vdp, 1, 0x50); // screen on, text mode
        write_register(&mut vdp, 7, 0x0F);
        assert_eq!(vdp.mode(), DisplayMode::Text);
        run_to_line(&mut vdp, 0);
        let white = ColorMode::Rgb555.pack(0xFFFFFF);
        assert!(vdp.get_frame().row(0).iter().all(|&p| p == white));
    }

    #[test]
    fn test_graphic1_rendering() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 1, 0x40);
        write_register(&mut vdp, 2, 0x06); // names at 0x1800
        write_register(&mut vdp, 3, 0x80); // colors at 0x2000
        write_register(&mut vdp, 4, 0x00); // patterns at 0x0000
        write_register(&mut vdp, 5, 0x36); // sprites at 0x1B00
        write_register(&mut vdp, 7, 0x01);
        vdp.vram_mut()[0x1B00] = 208;

        // Tile 1 of line 1 uses pattern 9, color group 1
        vdp.vram_mut()[0x1800 + 32 + 1] = 9;
        vdp.vram_mut()[9 * 8 + 3] = 0b1010_0000;
        vdp.vram_mut()[0x2000 + 1] = 0xF0; // white on transparent

        run_to_line(&mut vdp, 11);
        let row = vdp.get_frame().row(11);
        let white = vdp.palette[15];
        let black = vdp.palette[1];
        assert_eq!(row[8], white);
        assert_eq!(row[9], black);
        assert_eq!(row[10], white);
        assert_eq!(row[11], black);
        assert_eq!(row[0], black);
    }

    #[test]
    fn test_graphic2_banks_by_third() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 0, 0x02);
        write_register(&mut vdp, 1, 0x40);
        write_register(&mut vdp, 2, 0x0E); // names at 0x3800
        write_register(&mut vdp, 3, 0xFF); // colors at 0x2000, full mask
        write_register(&mut vdp, 4, 0x03); // patterns at 0x0000, full mask
        write_register(&mut vdp, 5, 0x76); // sprites at 0x3B00
        vdp.vram_mut()[0x3B00] = 208;
        assert_eq!(vdp.mode(), DisplayMode::Graphic2);

        // Line 64 is the first line of the middle third: name 0 -> pattern 256
        fill_vram(&mut vdp, 256 * 8, &[0xFF]);
        fill_vram(&mut vdp, 0x2000 + 256 * 8, &[0x40]); // blue foreground

        run_to_line(&mut vdp, 64);
        let blue = vdp.palette[4];
        assert!(vdp.get_frame().row(64)[..8].iter().all(|&p| p == blue));
    }

    #[test]
    fn test_line_callback() {
        use std::sync::{Arc, Mutex};

        let lines = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&lines);
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        vdp.set_line_callback(Some(Box::new(move |frame, line, pixels| {
            assert_eq!(pixels.len(), SCREEN_WIDTH);
            seen.lock().unwrap().push((frame, line));
        })));
        vdp.tick(STEPS_PER_FRAME);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), SCREEN_HEIGHT);
        assert_eq!(lines[0], (0, 0));
        assert_eq!(lines[191], (0, 191));
    }

    #[test]
    fn test_context_roundtrip() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 1, 0x62);
        write_register(&mut vdp, 7, 0x05);
        set_write_address(&mut vdp, 0x0100);
        vdp.write_data(0x77);
        vdp.tick(12345);

        let bytes = vdp.context().to_bytes();
        assert_eq!(bytes.len(), VdpContext::ENCODED_LEN);
        assert_eq!(bytes.len(), 16418);

        let mut other = Vdp::new(ColorMode::Rgb565);
        other.set_context(&bytes);
        assert_eq!(other.context(), vdp.context());
        assert_eq!(other.backdrop_color(false), vdp.backdrop_color(false));
        assert_eq!(other.cache.sprite_size, 16);
    }

    #[test]
    fn test_context_roundtrip_after_register_write() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 1, 0x40);
        vdp.tick(500);

        let mut other = Vdp::new(ColorMode::Rgb565);
        other.set_context(&vdp.context().to_bytes());
        assert_eq!(other.context(), vdp.context());
    }

    #[test]
    fn test_with_context_folds_counters() {
        let mut ctx = VdpContext::default();
        ctx.count_h = H_TOTAL + 5;
        ctx.count_v = V_TOTAL * 2 + 3;
        ctx.latch = 3;
        ctx.addr = 0xFFFF;
        ctx.ram.truncate(16);

        let mut vdp = Vdp::with_context(ColorMode::Rgb565, ctx);
        assert_eq!(vdp.ctx.count_h, 5);
        assert_eq!(vdp.ctx.count_v, 3);
        assert_eq!(vdp.ctx.latch, 1);
        assert_eq!(vdp.ctx.addr, VRAM_MASK as u16);
        assert_eq!(vdp.vram().len(), VRAM_SIZE);
        assert!(vdp.tick(STEPS_PER_FRAME).frame_break);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut vdp = Vdp::new(ColorMode::Rgb565);
        write_register(&mut vdp, 1, 0x40);
        vdp.vram_mut()[5] = 1;
        vdp.tick(STEPS_PER_FRAME);
        vdp.reset();
        assert_eq!(vdp.context(), &VdpContext::default());
        assert!(!vdp.cache.screen_enabled);
    }
}
