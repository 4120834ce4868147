//! Keyboard matrix
//!
//! The PPI selects one of the matrix rows through port C and the row is
//! read back active low on port B. Hosts either send one character code
//! per frame, which is translated through a built-in table, or hand over
//! a complete row map.

/// Joystick select button 1 (bit 6 of the active-high pad layout)
pub const JOY_S1: u8 = 0x40;
/// Joystick select button 2 (bit 7)
pub const JOY_S2: u8 = 0x80;

/// Row holding the SHIFT key (column 0)
const SHIFT_ROW: u8 = 6;

/// Cursor and function key codes accepted by [`Keyboard::scan`]
pub mod codes {
    pub const CTRL_STOP: u8 = 0x18;
    pub const ESC: u8 = 0x1B;
    pub const BACKSPACE: u8 = 0x7F;
    pub const UP: u8 = 0xC0;
    pub const DOWN: u8 = 0xC1;
    pub const LEFT: u8 = 0xC2;
    pub const RIGHT: u8 = 0xC3;
    /// F1..F10 are 0xF1..0xFA
    pub const F1: u8 = 0xF1;
}

/// Matrix position of a character code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCode {
    /// (column, row) pairs, at most two
    positions: [(u8, u8); 2],
    count: usize,
    shift: bool,
}

impl KeyCode {
    fn single(x: u8, y: u8, shift: bool) -> Self {
        Self {
            positions: [(x, y), (0, 0)],
            count: 1,
            shift,
        }
    }

    pub fn positions(&self) -> &[(u8, u8)] {
        &self.positions[..self.count]
    }

    pub fn shift(&self) -> bool {
        self.shift
    }
}

/// Joystick select buttons bound to keys
#[derive(Debug, Default, Clone, Copy)]
struct KeyAssign {
    s1: Option<KeyCode>,
    s2: Option<KeyCode>,
}

pub struct Keyboard {
    codes: [Option<KeyCode>; 256],
    assign: [KeyAssign; 2],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        let mut keyboard = Self {
            codes: [None; 256],
            assign: [KeyAssign::default(); 2],
        };
        keyboard.init_codes();
        keyboard
    }

    fn define(&mut self, code: u8, x: u8, y: u8, shift: bool) {
        self.codes[code as usize] = Some(KeyCode::single(x, y, shift));
    }

    fn init_codes(&mut self) {
        // Rows 0-2: digits and symbols, shifted pairs share a key
        let symbols: [(u8, u8, u8, u8); 22] = [
            (b'0', 0, 0, 0),
            (b'1', b'!', 1, 0),
            (b'2', b'"', 2, 0),
            (b'3', b'#', 3, 0),
            (b'4', b'$', 4, 0),
            (b'5', b'%', 5, 0),
            (b'6', b'&', 6, 0),
            (b'7', b'\'', 7, 0),
            (b'8', b'(', 0, 1),
            (b'9', b')', 1, 1),
            (b'-', b'=', 2, 1),
            (b'^', b'~', 3, 1),
            (b'\\', b'|', 4, 1),
            (b'@', b'`', 5, 1),
            (b'[', b'{', 6, 1),
            (b';', b'+', 7, 1),
            (b':', b'*', 0, 2),
            (b']', b'}', 1, 2),
            (b',', b'<', 2, 2),
            (b'.', b'>', 3, 2),
            (b'/', b'?', 4, 2),
            (b'_', 0, 5, 2),
        ];
        for (plain, shifted, x, y) in symbols {
            self.define(plain, x, y, false);
            if shifted != 0 {
                self.define(shifted, x, y, true);
            }
        }

        // Letters start at column 6 of row 2
        for (i, letter) in (b'a'..=b'z').enumerate() {
            let pos = i + 6 + 2 * 8;
            let (x, y) = ((pos % 8) as u8, (pos / 8) as u8);
            self.define(letter, x, y, false);
            self.define(letter.to_ascii_uppercase(), x, y, true);
        }

        self.define(b'\r', 7, 7, false);
        self.define(b'\n', 7, 7, false);
        self.define(b'\t', 3, 7, false);
        self.define(b' ', 0, 8, false);
        self.codes[codes::CTRL_STOP as usize] = Some(KeyCode {
            positions: [(1, 6), (4, 7)],
            count: 2,
            shift: false,
        });
        self.define(codes::ESC, 2, 7, false);
        self.define(codes::BACKSPACE, 5, 7, false);
        self.define(codes::UP, 5, 8, false);
        self.define(codes::DOWN, 6, 8, false);
        self.define(codes::LEFT, 4, 8, false);
        self.define(codes::RIGHT, 7, 8, false);

        // F1-F5, F6-F10 are the same keys with SHIFT
        let function_keys = [(5, 6), (6, 6), (7, 6), (0, 7), (1, 7)];
        for (i, (x, y)) in function_keys.into_iter().enumerate() {
            self.define(codes::F1 + i as u8, x, y, false);
            self.define(codes::F1 + 5 + i as u8, x, y, true);
        }
    }

    pub fn key_code(&self, code: u8) -> Option<&KeyCode> {
        self.codes[code as usize].as_ref()
    }

    /// Bind a joystick select button of `player` (0 or 1) to a key.
    ///
    /// Returns false and leaves bindings untouched for an invalid player,
    /// button or key.
    pub fn assign(&mut self, player: usize, button: u8, key: u8) -> bool {
        let Some(code) = self.codes[key as usize] else {
            return false;
        };
        let Some(assign) = self.assign.get_mut(player) else {
            return false;
        };
        match button {
            JOY_S1 => assign.s1 = Some(code),
            JOY_S2 => assign.s2 = Some(code),
            _ => return false,
        }
        true
    }

    /// Read matrix `row` as the PPI sees it (0 bits are pressed keys).
    ///
    /// `key` is the character code held this frame (0 for none), `keymap`
    /// a full row map that replaces it, and `pads` the active-high joystick
    /// state. `read_key` counts how often the held key was observed.
    pub fn scan(
        &self,
        row: u8,
        key: u8,
        keymap: Option<&[u8]>,
        pads: [u8; 2],
        read_key: &mut u8,
    ) -> u8 {
        let mut result = 0u8;
        match keymap {
            Some(map) => result |= map.get(row as usize).copied().unwrap_or(0),
            None if key != 0 => {
                if let Some(code) = self.key_code(key) {
                    if code.shift && row == SHIFT_ROW {
                        result |= 0x01;
                    }
                    for &(x, y) in code.positions() {
                        if y == row {
                            *read_key = read_key.wrapping_add(1);
                            result |= 1 << x;
                        }
                    }
                }
            }
            None => {}
        }

        for (assign, pad) in self.assign.iter().zip(pads) {
            for (binding, button) in [(assign.s1, JOY_S1), (assign.s2, JOY_S2)] {
                let Some(code) = binding else { continue };
                let (x, y) = code.positions[0];
                if pad & button != 0 && y == row {
                    result |= 1 << x;
                }
            }
        }
        !result
    }
}
