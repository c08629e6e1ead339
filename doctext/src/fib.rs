//! The *File Information Block* at the start of the WordDocument stream
use ctxutils::io::{slice_at, ByteCursor};
use std::io;
use tracing::warn;

/// The WordDocument stream magic
pub const W_IDENT: u16 = 0xA5EC;
const KNOWN_NFIB: [u16; 5] = [0x00C1, 0x00D9, 0x0101, 0x010C, 0x0112];

/// The few FIB fields required to extract the main document text
///
/// See \[MS-DOC\] for the meaning of each field
#[allow(non_snake_case, missing_docs)]
#[derive(Debug, Clone)]
pub struct Fib {
    pub wIdent: u16,
    pub nFib: u16,
    pub fComplex: bool,
    pub fEncrypted: bool,
    /// Table stream selector, read from byte 10 bit 6
    pub fWhichTblStm: bool,
    pub fObfuscated: bool,
    pub ccpText: u32,
    pub fcPlcfBteChpx: u32,
    pub lcbPlcfBteChpx: u32,
    pub fcPlcfBtePapx: u32,
    pub lcbPlcfBtePapx: u32,
    pub fcClx: u32,
    pub lcbClx: u32,
}

/// Returns whether the stream starts with the WordDocument magic
pub fn has_word_ident(wd: &[u8]) -> bool {
    ByteCursor::new(wd).rdu16le().ok() == Some(W_IDENT)
}

impl Fib {
    /// Parses the FIB from the WordDocument stream
    pub fn parse(wd: &[u8]) -> Result<Self, io::Error> {
        let mut c = ByteCursor::new(wd);
        let w_ident = c.rdu16le()?;
        if w_ident != W_IDENT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Invalid FibBase magic (wIdent is {:x}, should be {:x})",
                    w_ident, W_IDENT
                ),
            ));
        }
        let n_fib = c.rdu16le()?;
        if !KNOWN_NFIB.contains(&n_fib) {
            warn!("Unknown nFib {:x}", n_fib);
        }
        let flags = slice_at(wd, 10, 2)?;
        let ccp_text = ByteCursor::at(wd, 76)?.rdi32le()?;
        let ccp_text = u32::try_from(ccp_text).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid ccpText ({})", ccp_text),
            )
        })?;
        let fc_lcb = |offset: usize| -> Result<(u32, u32), io::Error> {
            let mut c = ByteCursor::at(wd, offset)?;
            Ok((c.rdu32le()?, c.rdu32le()?))
        };
        let (fc_chpx, lcb_chpx) = fc_lcb(250)?;
        let (fc_papx, lcb_papx) = fc_lcb(258)?;
        let (fc_clx, lcb_clx) = fc_lcb(418)?;
        if lcb_clx == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "The document has no Clx",
            ));
        }
        Ok(Self {
            wIdent: w_ident,
            nFib: n_fib,
            fComplex: flags[0] & 0b100 != 0,
            fEncrypted: flags[1] & 0b1 != 0,
            fWhichTblStm: flags[0] & 0b100_0000 != 0,
            fObfuscated: flags[1] & 0b1000_0000 != 0,
            ccpText: ccp_text,
            fcPlcfBteChpx: fc_chpx,
            lcbPlcfBteChpx: lcb_chpx,
            fcPlcfBtePapx: fc_papx,
            lcbPlcfBtePapx: lcb_papx,
            fcClx: fc_clx,
            lcbClx: lcb_clx,
        })
    }

    /// The name of the table stream
    pub fn table_name(&self) -> &'static str {
        if self.fWhichTblStm {
            "1Table"
        } else {
            "0Table"
        }
    }

    /// The name of the table stream which is not referenced
    pub fn other_table_name(&self) -> &'static str {
        if self.fWhichTblStm {
            "0Table"
        } else {
            "1Table"
        }
    }
}
