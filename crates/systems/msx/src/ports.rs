//! I/O port decoding
//!
//! Only the exact port numbers below are decoded; everything else reads
//! 0xFF and ignores writes.
//!
//! | Port | In | Out |
//! |------|----|-----|
//! | 0x98 | VDP data | VDP data |
//! | 0x99 | VDP status | VDP address/register |
//! | 0xA0 | | PSG register latch |
//! | 0xA1 | | PSG data |
//! | 0xA2 | PSG data | |
//! | 0xA8 | primary slot | primary slot |
//! | 0xA9 | keyboard row | |
//! | 0xAA | PPI port C | PPI port C |
//! | 0xAB | | PPI bit set/reset |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InPort {
    VdpData,
    VdpStatus,
    PsgData,
    PrimarySlot,
    KeyboardRow,
    PpiPortC,
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutPort {
    VdpData,
    VdpAddress,
    PsgLatch,
    PsgData,
    PrimarySlot,
    PpiPortC,
    PpiControl,
    Unmapped,
}

/// Port handlers indexed by port number, built once
pub struct PortMap {
    input: [InPort; 256],
    output: [OutPort; 256],
}

impl Default for PortMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PortMap {
    pub fn new() -> Self {
        let mut input = [InPort::Unmapped; 256];
        let mut output = [OutPort::Unmapped; 256];

        input[0x98] = InPort::VdpData;
        input[0x99] = InPort::VdpStatus;
        input[0xA2] = InPort::PsgData;
        input[0xA8] = InPort::PrimarySlot;
        input[0xA9] = InPort::KeyboardRow;
        input[0xAA] = InPort::PpiPortC;

        output[0x98] = OutPort::VdpData;
        output[0x99] = OutPort::VdpAddress;
        output[0xA0] = OutPort::PsgLatch;
        output[0xA1] = OutPort::PsgData;
        output[0xA8] = OutPort::PrimarySlot;
        output[0xAA] = OutPort::PpiPortC;
        output[0xAB] = OutPort::PpiControl;

        Self { input, output }
    }

    #[inline]
    pub fn input(&self, port: u8) -> InPort {
        self.input[port as usize]
    }

    #[inline]
    pub fn output(&self, port: u8) -> OutPort {
        self.output[port as usize]
    }
}
