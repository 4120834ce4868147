//! Sprite layer
//!
//! Sprites are scanned in attribute table order. Lower numbered sprites
//! have priority, a Y of 208 ends the table and only four opaque sprites
//! fit on a line. The fifth is still drawn but raises the 5th sprite flag
//! and takes no part in collision; any further sprite on the line is
//! dropped.

use super::{AddressCache, VdpContext, STATUS_COLLISION, STATUS_FIFTH_SPRITE, VRAM_MASK};

const MAX_SPRITES: usize = 32;
const END_OF_TABLE: u8 = 208;
const LINE_LIMIT: usize = 5;

/// Sprite top line. Y counts from -1 and values past 0xD0 wrap above the
/// screen so sprites can scroll in from the top.
fn top_line(y: u8) -> i32 {
    if y > END_OF_TABLE {
        y as i32 - 255
    } else {
        y as i32 + 1
    }
}

pub(super) fn render_line(
    ctx: &mut VdpContext,
    cache: &AddressCache,
    palette: &[u16; 16],
    line: usize,
    row: &mut [u16],
) {
    let ram = &ctx.ram;
    let size = cache.sprite_size;
    let mag = cache.sprite_mag;
    let height = (size * mag) as i32;
    let line = line as i32;

    let mut covered = [false; 256];
    let mut visible = 0;

    for index in 0..MAX_SPRITES {
        let attr = cache.sprite_attributes + index * 4;
        let y = ram[attr & VRAM_MASK];
        if y == END_OF_TABLE {
            break;
        }
        let top = top_line(y);
        if line < top || line >= top + height {
            continue;
        }
        if visible >= LINE_LIMIT {
            break;
        }

        let mut x = ram[(attr + 1) & VRAM_MASK] as i32;
        let name = ram[(attr + 2) & VRAM_MASK] as usize;
        let attributes = ram[(attr + 3) & VRAM_MASK];
        if attributes & 0x80 != 0 {
            // Early clock
            x -= 32;
        }
        let color = (attributes & 0x0F) as usize;
        let opaque = color != 0;

        let mut collides = true;
        if opaque {
            visible += 1;
            if ctx.stat & STATUS_FIFTH_SPRITE == 0 {
                ctx.stat = (ctx.stat & 0xE0) | index as u8;
                if visible == LINE_LIMIT {
                    ctx.stat |= STATUS_FIFTH_SPRITE;
                }
            }
            if visible == LINE_LIMIT {
                collides = false;
            }
        }

        let pattern = if size == 16 {
            cache.sprite_patterns + (name & 0xFC) * 8
        } else {
            cache.sprite_patterns + name * 8
        };
        let pattern_row = ((line - top) / mag as i32) as usize;

        for column in 0..size * mag {
            let px = x + column as i32;
            if px > 255 {
                break;
            }
            if px < 0 {
                continue;
            }
            let px = px as usize;
            if covered[px] {
                // Raised for every column the sprite spans, set or not
                if collides {
                    ctx.stat |= STATUS_COLLISION;
                }
                continue;
            }

            let pc = column / mag;
            let half = if pc >= 8 { 16 } else { 0 };
            let bits = ram[(pattern + pattern_row + half) & VRAM_MASK];
            if bits & (0x80 >> (pc & 7)) == 0 {
                continue;
            }
            if opaque {
                covered[px] = true;
                row[px] = palette[color];
            }
        }
    }
}
