//! Formatted disk pages (Fkp) for character and paragraph properties
use crate::sprm::{parse_grpprl, Prl, MAX_GRPPRL_SIZE, SPRM_P_HUGE_PAPX, SPRM_P_TABLE_PROPS};
use ctxutils::io::{slice_at, ByteCursor};
use std::io;

/// The size of a page in bytes
pub const FKP_PAGE_SIZE: usize = 512;
const MAX_CHPX_RUNS: u8 = 0x65;
const MAX_PAPX_RUNS: u8 = 0x1D;
const BX_PAP_SIZE: usize = 13;

/// Provides the Data stream on demand
///
/// Only called when a paragraph property is redirected; a missing stream is reported
/// with [`NotFound`](std::io::ErrorKind::NotFound)
pub type DataLoader<'d> = dyn Fn() -> Result<&'d [u8], io::Error> + 'd;

/// A page of property runs, indexed by stream offset
pub trait FkpPage: Sized {
    /// The run boundaries: `crun + 1` stream offsets
    fn rgfc(&self) -> &[u32];

    /// The properties of the `run`-th run
    fn grpprl(&self, run: usize) -> &[Prl];

    /// Returns the properties applied at the stream offset `fc`, if the page covers it
    fn lookup(&self, fc: u32) -> Option<&[Prl]> {
        let rgfc = self.rgfc();
        let i = rgfc.partition_point(|v| *v <= fc);
        if i == 0 || i >= rgfc.len() {
            return None;
        }
        Some(self.grpprl(i - 1))
    }
}

fn read_header(page: &[u8], max_crun: u8, what: &str) -> Result<(usize, Vec<u32>), io::Error> {
    if page.len() != FKP_PAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} size ({})", what, page.len()),
        ));
    }
    let crun = page[FKP_PAGE_SIZE - 1];
    if crun > max_crun {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid {} crun ({}, max {})", what, crun, max_crun),
        ));
    }
    let mut c = ByteCursor::new(page);
    let rgfc = (0..=usize::from(crun))
        .map(|_| c.rdu32le())
        .collect::<Result<Vec<u32>, io::Error>>()?;
    Ok((usize::from(crun), rgfc))
}

/// A *ChpxFkp*: character property runs
#[derive(Debug)]
pub struct ChpxFkp {
    rgfc: Vec<u32>,
    chpx: Vec<Vec<Prl>>,
}

impl ChpxFkp {
    /// Parses a 512 bytes page
    pub fn parse(page: &[u8]) -> Result<Self, io::Error> {
        let (crun, rgfc) = read_header(page, MAX_CHPX_RUNS, "ChpxFkp")?;
        let rgb = &page[(crun + 1) * 4..(crun + 1) * 4 + crun];
        let chpx = rgb
            .iter()
            .map(|offset| {
                if *offset == 0 {
                    return Ok(Vec::new());
                }
                let mut c = ByteCursor::at(page, usize::from(*offset) * 2)?;
                let cb = c.rdu8()?;
                let grpprl = c.take(usize::from(cb)).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Chpx at offset {} exceeds the page", usize::from(*offset) * 2),
                    )
                })?;
                parse_grpprl(grpprl)
            })
            .collect::<Result<Vec<Vec<Prl>>, io::Error>>()?;
        Ok(Self { rgfc, chpx })
    }
}

impl FkpPage for ChpxFkp {
    fn rgfc(&self) -> &[u32] {
        &self.rgfc
    }

    fn grpprl(&self, run: usize) -> &[Prl] {
        self.chpx.get(run).map(|v| v.as_slice()).unwrap_or_default()
    }
}

/// The paragraph properties of a run
#[derive(Debug, Default)]
pub struct PapxInFkp {
    /// The paragraph style
    pub istd: u16,
    /// The properties, with Data stream redirections already resolved
    pub grpprl: Vec<Prl>,
}

/// A *PapxFkp*: paragraph property runs
#[derive(Debug)]
pub struct PapxFkp {
    rgfc: Vec<u32>,
    papx: Vec<PapxInFkp>,
}

impl PapxFkp {
    /// Parses a 512 bytes page
    ///
    /// `data` yields the Data stream, needed when properties are too large to fit the page
    pub fn parse(page: &[u8], data: &DataLoader<'_>) -> Result<Self, io::Error> {
        let (crun, rgfc) = read_header(page, MAX_PAPX_RUNS, "PapxFkp")?;
        let mut bx = ByteCursor::at(page, (crun + 1) * 4)?;
        let mut papx = Vec::with_capacity(crun);
        for _ in 0..crun {
            let entry = bx.take(BX_PAP_SIZE)?;
            let offset = usize::from(entry[0]) * 2;
            if offset == 0 {
                papx.push(PapxInFkp::default());
            } else {
                papx.push(parse_papx(page, offset, data)?);
            }
        }
        Ok(Self { rgfc, papx })
    }
}

impl FkpPage for PapxFkp {
    fn rgfc(&self) -> &[u32] {
        &self.rgfc
    }

    fn grpprl(&self, run: usize) -> &[Prl] {
        self.papx
            .get(run)
            .map(|v| v.grpprl.as_slice())
            .unwrap_or_default()
    }
}

fn parse_papx(page: &[u8], offset: usize, data: &DataLoader<'_>) -> Result<PapxInFkp, io::Error> {
    let overflow = || {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("PapxInFkp at offset {} exceeds the page", offset),
        )
    };
    let mut c = ByteCursor::at(page, offset)?;
    let cb = c.rdu8()?;
    let payload = if cb != 0 {
        c.take(usize::from(cb) * 2 - 1).map_err(|_| overflow())?
    } else {
        let cb = c.rdu8()?;
        if cb == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("PapxInFkp at offset {} has a null size", offset),
            ));
        }
        c.take(usize::from(cb) * 2).map_err(|_| overflow())?
    };
    let mut c = ByteCursor::new(payload);
    let istd = c.rdu16le().map_err(|_| overflow())?;
    let mut grpprl = Vec::new();
    while c.remaining() > 0 {
        let prl = Prl::parse(&mut c)?;
        if prl.sprm.0 == SPRM_P_HUGE_PAPX || prl.sprm.0 == SPRM_P_TABLE_PROPS {
            grpprl.extend(redirected_grpprl(&prl, data)?);
            break;
        }
        grpprl.push(prl);
    }
    Ok(PapxInFkp { istd, grpprl })
}

fn redirected_grpprl(prl: &Prl, data: &DataLoader<'_>) -> Result<Vec<Prl>, io::Error> {
    let offset = prl.operand_u32().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid operand for Prl {:04x}", prl.sprm.0),
        )
    })?;
    let data = data()?;
    let mut c = ByteCursor::new(slice_at(data, u64::from(offset), 2)?);
    let cb = c.rdi16le()?;
    if !(1..=MAX_GRPPRL_SIZE).contains(&cb) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid grpprl size {} in Data stream at offset {}", cb, offset),
        ));
    }
    parse_grpprl(slice_at(data, u64::from(offset) + 2, cb as u64)?)
}
