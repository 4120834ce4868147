//! Snapshot chunk container
//!
//! A snapshot is a flat sequence of chunks:
//!
//! ```text
//! [name: 4 bytes, NUL padded][length: u32 LE][payload: length bytes]
//! ```
//!
//! Readers stop quietly at the first header they cannot trust so that
//! snapshots from older or newer builds restore as far as they can.

use crate::system::MsxError;
use emu_core::logging::{log, LogCategory, LogLevel};

pub const CHUNK_HEADER_LEN: usize = 8;

/// Known chunk kinds, in the order they are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Board,
    Cpu,
    Mmu,
    Ram,
    Sram,
    Psg,
    Vdp,
}

impl ChunkKind {
    pub fn tag(self) -> [u8; 4] {
        match self {
            ChunkKind::Board => *b"BRD\0",
            ChunkKind::Cpu => *b"Z80\0",
            ChunkKind::Mmu => *b"MMU\0",
            ChunkKind::Ram => *b"RAM\0",
            ChunkKind::Sram => *b"SRM\0",
            ChunkKind::Psg => *b"PSG\0",
            ChunkKind::Vdp => *b"VDP\0",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        [
            ChunkKind::Board,
            ChunkKind::Cpu,
            ChunkKind::Mmu,
            ChunkKind::Ram,
            ChunkKind::Sram,
            ChunkKind::Psg,
            ChunkKind::Vdp,
        ]
        .into_iter()
        .find(|kind| kind.tag() == tag)
    }
}

/// Builds a snapshot into a buffer reserved up front
pub struct ChunkWriter {
    buf: Vec<u8>,
}

impl ChunkWriter {
    /// Reserve room for chunks with the given payload lengths
    pub fn with_payloads(payload_lens: &[usize]) -> Result<Self, MsxError> {
        let total = payload_lens
            .iter()
            .map(|len| len + CHUNK_HEADER_LEN)
            .sum::<usize>();
        let mut buf = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| MsxError::SnapshotAllocation)?;
        Ok(Self { buf })
    }

    pub fn push(&mut self, kind: ChunkKind, payload: &[u8]) {
        self.buf.extend_from_slice(&kind.tag());
        self.buf
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(payload);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// One decoded chunk, borrowing its payload from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: ChunkKind,
    pub payload: &'a [u8],
}

/// Iterates chunks until the data ends or a header is malformed
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn stop(&mut self, reason: &str) -> Option<Chunk<'a>> {
        log(LogCategory::Snapshot, LogLevel::Warn, || {
            format!("SNAPSHOT: {} at offset {}, restore stops", reason, self.pos)
        });
        self.pos = self.data.len();
        None
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        if self.remaining() < CHUNK_HEADER_LEN {
            return None;
        }
        let header = &self.data[self.pos..self.pos + CHUNK_HEADER_LEN];
        let tag = &header[..4];
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if tag[3] != 0 {
            return self.stop("unterminated chunk name");
        }
        if len < 1 || len > self.remaining() - CHUNK_HEADER_LEN {
            return self.stop("bad chunk length");
        }
        let Some(kind) = ChunkKind::from_tag(tag) else {
            return self.stop("unknown chunk");
        };

        let start = self.pos + CHUNK_HEADER_LEN;
        self.pos = start + len;
        log(LogCategory::Snapshot, LogLevel::Debug, || {
            format!("SNAPSHOT: {:?} chunk, {} bytes", kind, len)
        });
        Some(Chunk {
            kind,
            payload: &self.data[start..start + len],
        })
    }
}
