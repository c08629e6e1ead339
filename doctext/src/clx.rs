//! The piece table: *Clx*, *Pcdt* and *PlcPcd*
use crate::sprm::{parse_grpprl, Prl, MAX_GRPPRL_SIZE};
use ctxutils::io::ByteCursor;
use std::io;
use std::ops::Range;

/// Size of a *Pcd* in bytes
const PCD_SIZE: usize = 8;

/// Location of the text of a piece in the WordDocument stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcCompressed(pub u32);

impl FcCompressed {
    /// Whether the piece is stored as 8 bit characters
    pub fn is_compressed(&self) -> bool {
        self.0 & (1 << 30) != 0
    }

    /// The stream offset of the first character of the piece
    pub fn offset(&self) -> u32 {
        let fc = self.0 & 0x3fffffff;
        if self.is_compressed() {
            fc / 2
        } else {
            fc
        }
    }
}

/// Piece property modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prm {
    /// A single property with a one byte value
    Single {
        /// Index into the Sprm lookup table
        isprm: u8,
        /// The operand
        val: u8,
    },
    /// Index into the Prc list of the [`Clx`]
    Complex {
        /// The Prc index
        igrpprl: u16,
    },
}

impl From<u16> for Prm {
    fn from(prm: u16) -> Self {
        if prm & 1 != 0 {
            Self::Complex { igrpprl: prm >> 1 }
        } else {
            Self::Single {
                isprm: (prm & 0xff) as u8 >> 1,
                val: (prm >> 8) as u8,
            }
        }
    }
}

/// A piece descriptor
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct Pcd {
    /// The piece does not end with a paragraph mark
    pub fNoParaLast: bool,
    /// Where the text is stored
    pub fc: FcCompressed,
    /// Properties applied to the whole piece
    pub prm: Prm,
}

impl Pcd {
    fn parse(c: &mut ByteCursor) -> Result<Self, io::Error> {
        let flags = c.rdu16le()?;
        let fc = FcCompressed(c.rdu32le()?);
        let prm = Prm::from(c.rdu16le()?);
        Ok(Self {
            fNoParaLast: flags & 1 != 0,
            fc,
            prm,
        })
    }
}

/// A contiguous run of text sharing the same storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Character positions covered
    pub cp: Range<u32>,
    /// One byte per character when set, two otherwise
    pub compressed: bool,
    /// Stream offset of the first character
    pub offset: u32,
}

impl Piece {
    /// The number of characters in the piece
    pub fn len(&self) -> u32 {
        self.cp.end - self.cp.start
    }

    /// Whether the piece holds no characters
    pub fn is_empty(&self) -> bool {
        self.cp.is_empty()
    }

    /// The number of bytes used by each character
    pub fn char_size(&self) -> u32 {
        if self.compressed {
            1
        } else {
            2
        }
    }
}

/// The piece table
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct PlcPcd {
    /// Character positions (one more than the number of pieces)
    pub aCP: Vec<u32>,
    /// Piece descriptors
    pub aPcd: Vec<Pcd>,
}

impl PlcPcd {
    /// Parses a PlcPcd of exactly `data.len()` bytes
    pub fn parse(data: &[u8]) -> Result<Self, io::Error> {
        if data.len() < 4 || (data.len() - 4) % (4 + PCD_SIZE) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid PlcPcd size ({})", data.len()),
            ));
        }
        let n_of_pcds = (data.len() - 4) / (4 + PCD_SIZE);
        if n_of_pcds == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "No Pcd's found"));
        }
        let mut c = ByteCursor::new(data);
        let mut cps: Vec<u32> = Vec::with_capacity(n_of_pcds + 1);
        for i in 0..(n_of_pcds + 1) {
            let cp = c.rdi32le()?;
            let prev = cps.last().map(|v| i64::from(*v)).unwrap_or(-1);
            if (i == 0 && cp != 0) || (i > 0 && i64::from(cp) <= prev) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Found invalid CP ({}) at PlcPcd position {}", cp, i),
                ));
            }
            cps.push(cp as u32); // Safe: cp >= 0
        }
        let pcds = (0..n_of_pcds)
            .map(|_| Pcd::parse(&mut c))
            .collect::<Result<Vec<Pcd>, io::Error>>()?;
        Ok(Self {
            aCP: cps,
            aPcd: pcds,
        })
    }

    /// Iterates over the pieces in CP order
    pub fn pieces(&self) -> impl Iterator<Item = Piece> + '_ {
        self.aPcd.iter().enumerate().map(|(i, pcd)| Piece {
            cp: self.aCP[i]..self.aCP[i + 1],
            compressed: pcd.fc.is_compressed(),
            offset: pcd.fc.offset(),
        })
    }

    /// The number of characters covered by the whole table
    pub fn total_cp(&self) -> u32 {
        self.aCP.last().copied().unwrap_or(0)
    }
}

/// The *Clx*: piece property lists followed by the piece table
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct Clx {
    /// Property lists referenced by [`Prm::Complex`]
    pub RgPrc: Vec<Vec<Prl>>,
    /// The piece table
    pub Pcdt: PlcPcd,
}

impl Clx {
    /// Parses the Clx from the `lcbClx` bytes found at `fcClx` in the table stream
    pub fn parse(data: &[u8]) -> Result<Self, io::Error> {
        let mut c = ByteCursor::new(data);
        let mut prc: Vec<Vec<Prl>> = Vec::new();
        loop {
            let clxt = c.rdu8()?;
            if clxt == 2 {
                break;
            }
            if clxt != 1 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid Clx entry type ({})", clxt),
                ));
            }
            let sz = c.rdi16le()?;
            if !(0..=MAX_GRPPRL_SIZE).contains(&sz) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid PrcData len ({})", sz),
                ));
            }
            let grpprl = c.take(sz as usize).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("PrcData overflow (size {}, available {})", sz, c.remaining()),
                )
            })?;
            prc.push(parse_grpprl(grpprl)?);
        }
        let lcb = c.rdu32le()?;
        let plc_pcd = usize::try_from(lcb)
            .ok()
            .and_then(|lcb| c.clone().take(lcb).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Pcdt overflow (size {}, available {})", lcb, c.remaining()),
                )
            })?;
        Ok(Self {
            RgPrc: prc,
            Pcdt: PlcPcd::parse(plc_pcd)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn plc_pcd(cps: &[i32], fcs: &[u32]) -> Vec<u8> {
        let mut ret: Vec<u8> = cps.iter().flat_map(|v| v.to_le_bytes()).collect();
        for fc in fcs {
            ret.extend([0, 0]);
            ret.extend(fc.to_le_bytes());
            ret.extend(0x0003u16.to_le_bytes());
        }
        ret
    }

    #[test]
    fn fc_compressed() {
        let fc = FcCompressed(0x4000_0800);
        assert!(fc.is_compressed());
        assert_eq!(fc.offset(), 0x400);
        let fc = FcCompressed(0x0000_0800);
        assert!(!fc.is_compressed());
        assert_eq!(fc.offset(), 0x800);
        assert_eq!(FcCompressed(0x8000_0800).offset(), 0x800);
    }

    #[test]
    fn prm() {
        assert_eq!(Prm::from(0x0003), Prm::Complex { igrpprl: 1 });
        assert_eq!(Prm::from(0x3420), Prm::Single { isprm: 0x10, val: 0x34 });
    }

    #[test]
    fn clx() -> Result<(), io::Error> {
        let mut data = vec![1u8, 3, 0, 0x3c, 0x08, 1];
        let pcd = plc_pcd(&[0, 5, 12], &[0x4000_1000, 0x2000]);
        data.push(2);
        data.extend((pcd.len() as u32).to_le_bytes());
        data.extend(pcd);
        let clx = Clx::parse(&data)?;
        assert_eq!(clx.RgPrc.len(), 1);
        assert_eq!(clx.RgPrc[0][0].sprm.0, 0x083c);
        assert_eq!(clx.Pcdt.total_cp(), 12);
        assert_eq!(clx.Pcdt.aPcd[0].prm, Prm::Complex { igrpprl: 1 });
        let pieces: Vec<Piece> = clx.Pcdt.pieces().collect();
        assert_eq!(
            pieces,
            vec![
                Piece {
                    cp: 0..5,
                    compressed: true,
                    offset: 0x800
                },
                Piece {
                    cp: 5..12,
                    compressed: false,
                    offset: 0x2000
                }
            ]
        );
        assert_eq!(pieces[1].len(), 7);
        assert_eq!(pieces[1].char_size(), 2);
        Ok(())
    }

    #[test]
    fn bad_clx() {
        // unknown entry type
        assert!(Clx::parse(&[3, 0, 0]).is_err());
        // oversized Prc
        assert!(Clx::parse(&[1, 0xa3, 0x3f]).is_err());
        // negative Prc size
        assert!(Clx::parse(&[1, 0xff, 0xff]).is_err());
        // Pcdt larger than the Clx
        let pcd = plc_pcd(&[0, 5], &[0x1000]);
        let mut data = vec![2u8];
        data.extend((pcd.len() as u32 + 1).to_le_bytes());
        data.extend(pcd);
        assert!(Clx::parse(&data).is_err());
        // not starting at 0
        assert!(PlcPcd::parse(&plc_pcd(&[1, 5], &[0x1000])).is_err());
        // not increasing
        assert!(PlcPcd::parse(&plc_pcd(&[0, 5, 5], &[0x1000, 0x2000])).is_err());
        assert!(PlcPcd::parse(&plc_pcd(&[0, -5], &[0x1000])).is_err());
        // no pieces or bad size
        assert!(PlcPcd::parse(&plc_pcd(&[0], &[])).is_err());
        assert!(PlcPcd::parse(&[0u8; 15]).is_err());
    }
}
