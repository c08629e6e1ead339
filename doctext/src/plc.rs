//! Bin tables (*PlcBteChpx*, *PlcBtePapx*) and the page caches built on them
use crate::fkp::{FkpPage, FKP_PAGE_SIZE};
use crate::sprm::Prl;
use ctxutils::io::{slice_at, ByteCursor};
use std::collections::HashMap;
use std::io;
use tracing::debug;

/// A bin table: maps stream offset ranges to Fkp page numbers
#[allow(non_snake_case)]
#[derive(Debug, Default)]
pub struct PlcBte {
    /// Range boundaries: one more than the number of pages
    pub aFC: Vec<u32>,
    /// Page numbers
    pub aPn: Vec<u32>,
}

impl PlcBte {
    /// Parses the `lcb` bytes at `fc` in the table stream; an empty table is valid
    pub fn parse(table: &[u8], fc: u32, lcb: u32) -> Result<Self, io::Error> {
        if lcb == 0 {
            return Ok(Self::default());
        }
        if lcb < 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid PlcBte size ({})", lcb),
            ));
        }
        let data = slice_at(table, fc.into(), lcb.into())?;
        let n = (data.len() - 4) / 8;
        let mut c = ByteCursor::new(data);
        let a_fc = (0..=n)
            .map(|_| c.rdu32le())
            .collect::<Result<Vec<u32>, io::Error>>()?;
        let a_pn = (0..n)
            .map(|_| c.rdu32le().map(|pn| pn & 0x3FFFFF))
            .collect::<Result<Vec<u32>, io::Error>>()?;
        Ok(Self {
            aFC: a_fc,
            aPn: a_pn,
        })
    }

    /// Returns the index of the page covering `fc`
    pub fn find(&self, fc: u32) -> Option<usize> {
        let i = self.aFC.partition_point(|v| *v <= fc);
        if i == 0 || i > self.aPn.len() {
            None
        } else {
            Some(i - 1)
        }
    }
}

/// All the Fkp pages referenced by a bin table, decoded once
#[derive(Debug)]
pub struct PropertyCache<P: FkpPage> {
    plc: PlcBte,
    pages: Vec<P>,
    page_of: Vec<usize>,
}

impl<P: FkpPage> PropertyCache<P> {
    /// Loads the bin table at `fc`/`lcb` in `table` and decodes its pages from `wd`
    pub fn load<F>(wd: &[u8], table: &[u8], fc: u32, lcb: u32, mut parse_page: F) -> Result<Self, io::Error>
    where
        F: FnMut(&[u8]) -> Result<P, io::Error>,
    {
        let plc = PlcBte::parse(table, fc, lcb)?;
        let mut pages = Vec::new();
        let mut page_of = Vec::with_capacity(plc.aPn.len());
        let mut seen: HashMap<u32, usize> = HashMap::new();
        for pn in plc.aPn.iter() {
            let idx = match seen.get(pn) {
                Some(idx) => *idx,
                None => {
                    let page = slice_at(
                        wd,
                        u64::from(*pn) * FKP_PAGE_SIZE as u64,
                        FKP_PAGE_SIZE as u64,
                    )
                    .map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Fkp page {} is outside the WordDocument stream", pn),
                        )
                    })?;
                    pages.push(parse_page(page)?);
                    seen.insert(*pn, pages.len() - 1);
                    pages.len() - 1
                }
            };
            page_of.push(idx);
        }
        debug!(
            "Bin table with {} entries, {} distinct pages",
            plc.aPn.len(),
            pages.len()
        );
        Ok(Self {
            plc,
            pages,
            page_of,
        })
    }

    /// Returns the properties applied at the stream offset `fc`
    pub fn lookup(&self, fc: u32) -> &[Prl] {
        self.plc
            .find(fc)
            .and_then(|i| self.pages.get(self.page_of[i]))
            .and_then(|page| page.lookup(fc))
            .unwrap_or_default()
    }

    /// Whether no property is available
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
