//! The *Compound File Header*
use ctxutils::io::ByteCursor;
use ctxutils::win32::GUID;
use std::io;

/// Size of the portion of the header which carries data (v4 headers are zero padded to 4096)
pub const HEADER_SIZE: usize = 512;
/// Number of DIFAT entries stored inside the header
pub const INLINE_DIFAT_ENTRIES: usize = 109;
const SIGNATURE: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];
const MINOR_VERSION: u16 = 0x003e;
const BYTE_ORDER: u16 = 0xfffe;
const MINI_SECTOR_SHIFT: u16 = 6;
const MINI_STREAM_CUTOFF: u32 = 0x1000;

/// A validated *Compound File Header*
///
/// Only headers which can be safely used to locate the file structures are accepted:
/// signature, CLSID, versions, byte order, sector shifts and mini stream cutoff
/// must match the documented values
#[derive(Debug, Clone)]
pub struct OleHeader {
    /// Minor version (always `0x3e`)
    pub minor_version: u16,
    /// Major version (3 or 4)
    pub major_version: u16,
    /// Sector shift: 9 for version 3, 12 for version 4
    pub sector_shift: u16,
    /// Mini sector shift (always 6)
    pub mini_sector_shift: u16,
    /// Number of directory sectors (0 in version 3 files)
    pub dir_sectors: u32,
    /// Number of FAT sectors
    pub fat_sectors: u32,
    /// First directory sector
    pub first_dir_sector: u32,
    /// Transaction signature number
    pub transaction_signature: u32,
    /// Mini stream cutoff size (always 4096)
    pub mini_stream_cutoff: u32,
    /// First miniFAT sector
    pub first_minifat_sector: u32,
    /// Number of miniFAT sectors
    pub minifat_sectors: u32,
    /// First DIFAT sector
    pub first_difat_sector: u32,
    /// Number of DIFAT sectors
    pub difat_sectors: u32,
    /// The DIFAT entries stored in the header, including the unused ones
    pub inline_difat: Vec<u32>,
    /// Non fatal divergences from the format
    pub anomalies: Vec<String>,
}

impl OleHeader {
    /// Parses and validates the first 512 bytes of a compound file
    pub fn parse(buf: &[u8]) -> Result<Self, io::Error> {
        let mut c = ByteCursor::new(buf);
        if c.take(8)? != SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Not an ole file",
            ));
        }
        let clsid = GUID::from_le_bytes(c.take(16)?).unwrap_or_default();
        if !clsid.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Header CLSID is not null ({})", clsid),
            ));
        }
        let minor_version = c.rdu16le()?;
        if minor_version != MINOR_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Minor version set to {:04x} instead of {:04x}",
                    minor_version, MINOR_VERSION
                ),
            ));
        }
        let major_version = c.rdu16le()?;
        let byte_order = c.rdu16le()?;
        if byte_order != BYTE_ORDER {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Byte order set to {:04x} instead of {:04x}",
                    byte_order, BYTE_ORDER
                ),
            ));
        }
        let sector_shift = c.rdu16le()?;
        match (major_version, sector_shift) {
            (3, 9) | (4, 12) => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Invalid major version {} with sector shift {}",
                        major_version, sector_shift
                    ),
                ));
            }
        }
        let mini_sector_shift = c.rdu16le()?;
        if mini_sector_shift != MINI_SECTOR_SHIFT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Mini sector shift should be {} but is {}",
                    MINI_SECTOR_SHIFT, mini_sector_shift
                ),
            ));
        }
        let mut anomalies = Vec::new();
        if c.take(6)?.iter().any(|b| *b != 0) {
            anomalies.push("Reserved area is not zeroed".to_string());
        }
        let dir_sectors = c.rdu32le()?;
        if major_version == 3 && dir_sectors != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Number of directory sectors should be 0 for major version 3 but is {}",
                    dir_sectors
                ),
            ));
        }
        let fat_sectors = c.rdu32le()?;
        let first_dir_sector = c.rdu32le()?;
        let transaction_signature = c.rdu32le()?;
        let mini_stream_cutoff = c.rdu32le()?;
        if mini_stream_cutoff != MINI_STREAM_CUTOFF {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Mini Stream Cutoff Size should be {:x} but is {:x}",
                    MINI_STREAM_CUTOFF, mini_stream_cutoff
                ),
            ));
        }
        let first_minifat_sector = c.rdu32le()?;
        let minifat_sectors = c.rdu32le()?;
        let first_difat_sector = c.rdu32le()?;
        let difat_sectors = c.rdu32le()?;
        let inline_difat = (0..INLINE_DIFAT_ENTRIES)
            .map(|_| c.rdu32le())
            .collect::<Result<Vec<u32>, io::Error>>()?;
        Ok(Self {
            minor_version,
            major_version,
            sector_shift,
            mini_sector_shift,
            dir_sectors,
            fat_sectors,
            first_dir_sector,
            transaction_signature,
            mini_stream_cutoff,
            first_minifat_sector,
            minifat_sectors,
            first_difat_sector,
            difat_sectors,
            inline_difat,
            anomalies,
        })
    }

    /// The sector size in bytes (512 or 4096)
    pub fn sector_size(&self) -> u32 {
        1 << self.sector_shift
    }

    /// The mini sector size in bytes (64)
    pub fn mini_sector_size(&self) -> u32 {
        1 << self.mini_sector_shift
    }
}
