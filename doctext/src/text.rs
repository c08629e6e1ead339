//! Main document text assembly
use crate::clx::Clx;
use crate::fib::Fib;
use crate::fkp::{ChpxFkp, PapxFkp};
use crate::plc::PropertyCache;
use crate::visibility::VisibilityState;
use ctxutils::io::slice_at;
use std::io;
use tracing::{debug, warn};

/// Characters 0x80 to 0x9F of compressed text (cp1252)
///
/// The unassigned positions are kept as is
#[rustfmt::skip]
const COMP_LUT: [u16; 32] = [
    0x0080, 0x0081, 0x201a, 0x0192, 0x201e, 0x2026, 0x2020, 0x2021,
    0x02c6, 0x2030, 0x0160, 0x2039, 0x0152, 0x008d, 0x008e, 0x008f,
    0x0090, 0x2018, 0x2019, 0x201c, 0x201d, 0x2022, 0x2013, 0x2014,
    0x02dc, 0x2122, 0x0161, 0x203a, 0x0153, 0x009d, 0x009e, 0x0178,
];

const PARAGRAPH_MARK: u16 = 0x0D;

/// Maps a compressed (8 bit) character to its UTF-16 code unit
pub fn decode_compressed(b: u8) -> u16 {
    match b {
        0x80..=0x9f => COMP_LUT[usize::from(b - 0x80)],
        _ => u16::from(b),
    }
}

/// The parsed document structures needed to extract the text
#[derive(Debug)]
pub struct WordModel {
    /// The File Information Block
    pub fib: Fib,
    /// The piece table
    pub clx: Clx,
    /// Character properties
    pub chpx: PropertyCache<ChpxFkp>,
    /// Paragraph properties
    pub papx: PropertyCache<PapxFkp>,
}

/// Text assembly options
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOptions {
    /// Return paragraph marks as `\n`
    pub paragraph_newlines: bool,
}

impl WordModel {
    /// Decodes the visible text of the main document
    ///
    /// `wd` is the WordDocument stream. Pieces are scanned in CP order up to
    /// `ccpText` characters
    pub fn text(&self, wd: &[u8], options: TextOptions) -> Result<String, io::Error> {
        let target = self.fib.ccpText;
        let mut state = VisibilityState::new();
        let mut units: Vec<u16> = Vec::new();
        let mut scanned = 0u32;
        let mut hidden = 0u32;
        for piece in self.clx.Pcdt.pieces() {
            if scanned >= target {
                break;
            }
            let count = piece.len().min(target - scanned);
            let width = piece.char_size();
            let bytes = slice_at(
                wd,
                u64::from(piece.offset),
                u64::from(count) * u64::from(width),
            )
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Piece at CP {} ({} chars at offset {}) exceeds the WordDocument stream",
                        piece.cp.start, count, piece.offset
                    ),
                )
            })?;
            debug!(
                "Piece {:?}: {} chars at offset {}, compressed: {}",
                piece.cp, count, piece.offset, piece.compressed
            );
            for (i, chunk) in bytes.chunks_exact(width as usize).enumerate() {
                let ch = if piece.compressed {
                    decode_compressed(chunk[0])
                } else {
                    u16::from_le_bytes([chunk[0], chunk[1]])
                };
                let fc = piece.offset + i as u32 * width;
                let papx = self.papx.lookup(fc);
                let chpx = self.chpx.lookup(fc);
                if state.resolve(ch, papx, chpx) {
                    units.push(ch);
                } else {
                    hidden += 1;
                }
            }
            scanned += count;
        }
        if scanned < target {
            warn!(
                "The piece table covers {} characters out of {}",
                scanned, target
            );
        }
        units.truncate((target - hidden) as usize);
        if options.paragraph_newlines {
            for unit in units.iter_mut().filter(|u| **u == PARAGRAPH_MARK) {
                *unit = u16::from(b'\n');
            }
        }
        debug!(
            "Extracted {} code units, {} hidden characters",
            units.len(),
            hidden
        );
        Ok(String::from_utf16_lossy(&units))
    }
}
