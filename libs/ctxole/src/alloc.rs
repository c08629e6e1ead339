//! Sector allocation tables: DIFAT, FAT and miniFAT
use crate::header::OleHeader;
use crate::{DIFSECT, ENDOFCHAIN, FATSECT, FREESECT, MAXREGSECT};
use std::collections::HashSet;
use std::io;

fn table_entries(sector: &[u8]) -> impl Iterator<Item = u32> + '_ {
    sector
        .chunks_exact(4)
        .map(|v| u32::from_le_bytes([v[0], v[1], v[2], v[3]]))
}

/// Builds the full DIFAT from the header and the chained DIFAT sectors
pub(crate) fn build_difat<F>(
    header: &OleHeader,
    mut read_sector: F,
    anomalies: &mut Vec<String>,
) -> Result<Vec<u32>, io::Error>
where
    F: FnMut(u32) -> Result<Vec<u8>, io::Error>,
{
    let mut difat: Vec<u32> = Vec::new();
    for v in header.inline_difat.iter().copied() {
        match v {
            FREESECT => break,
            DIFSECT | FATSECT | ENDOFCHAIN => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Found DIFAT entry with special value 0x{:x}", v),
                ));
            }
            _ => difat.push(v),
        }
    }
    if header.difat_sectors == 0 || header.first_difat_sector == ENDOFCHAIN {
        return Ok(difat);
    }

    let mut difat_sector = header.first_difat_sector;
    let mut seen: HashSet<u32> = HashSet::new();
    for i in 0..header.difat_sectors {
        if !seen.insert(difat_sector) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "DIFAT chain loops back to sector {} after {} sectors",
                    difat_sector, i
                ),
            ));
        }
        if difat_sector > MAXREGSECT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "DIFAT sector {}/{} has special offset 0x{:x}",
                    i + 1,
                    header.difat_sectors,
                    difat_sector
                ),
            ));
        }
        let sec = read_sector(difat_sector)?;
        let (entries, next) = sec.split_at(sec.len() - 4);
        difat.extend(table_entries(entries).filter(|v| *v != FREESECT));
        difat_sector = u32::from_le_bytes([next[0], next[1], next[2], next[3]]);
        if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
            if i + 1 != header.difat_sectors {
                anomalies.push(format!(
                    "DIFAT chain ends on sector {} but {} were expected",
                    i + 1,
                    header.difat_sectors
                ));
            }
            break;
        }
    }
    if let Some(v) = difat.iter().find(|v| **v > MAXREGSECT) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Found DIFAT entry with special value 0x{:x}", v),
        ));
    }
    Ok(difat)
}

/// Builds the FAT by reading one sector per DIFAT entry
pub(crate) fn build_fat<F>(
    header: &OleHeader,
    difat: &[u32],
    mut read_sector: F,
    anomalies: &mut Vec<String>,
) -> Result<Vec<u32>, io::Error>
where
    F: FnMut(u32) -> Result<Vec<u8>, io::Error>,
{
    if u32::try_from(difat.len()).ok() != Some(header.fat_sectors) {
        anomalies.push(format!(
            "Number of FAT sectors in header is {} but {} were found in DIFAT",
            header.fat_sectors,
            difat.len()
        ));
    }
    let mut fat: Vec<u32> = Vec::with_capacity(difat.len() * (header.sector_size() as usize / 4));
    for fat_sector in difat {
        fat.extend(table_entries(&read_sector(*fat_sector)?));
    }
    if difat
        .iter()
        .any(|s| fat.get(*s as usize).copied() != Some(FATSECT))
    {
        anomalies.push("One or more FAT sectors are not marked as FATSECT".to_string());
    }
    Ok(fat)
}

/// Builds the miniFAT from its sector chain in the FAT
pub(crate) fn build_minifat<F>(
    header: &OleHeader,
    fat: &[u32],
    mut read_sector: F,
    anomalies: &mut Vec<String>,
) -> Result<Vec<u32>, io::Error>
where
    F: FnMut(u32) -> Result<Vec<u8>, io::Error>,
{
    if header.minifat_sectors == 0 || header.first_minifat_sector == ENDOFCHAIN {
        return Ok(Vec::new());
    }
    let chain = walk_chain(fat, header.first_minifat_sector, "MiniFAT")?;
    if u32::try_from(chain.len()).ok() != Some(header.minifat_sectors) {
        anomalies.push(format!(
            "MiniFAT has {} sectors but {} are declared in the header",
            chain.len(),
            header.minifat_sectors
        ));
    }
    let mut minifat: Vec<u32> = Vec::with_capacity(chain.len() * (header.sector_size() as usize / 4));
    for sector in chain {
        minifat.extend(table_entries(&read_sector(sector)?));
    }
    Ok(minifat)
}

/// Follows a sector chain from `first` until ENDOFCHAIN
///
/// The walk is bounded by the table size: longer chains necessarily loop
pub(crate) fn walk_chain(table: &[u32], first: u32, what: &str) -> Result<Vec<u32>, io::Error> {
    let mut ret = Vec::new();
    let mut cur = first;
    while cur != ENDOFCHAIN {
        if ret.len() >= table.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} chain starting at {} loops after {} sectors",
                    what,
                    first,
                    ret.len()
                ),
            ));
        }
        ret.push(cur);
        cur = next_sector(table, cur, first, what)?;
    }
    Ok(ret)
}

/// Returns the first `count` sectors of the chain starting at `first`
///
/// Fails if the chain is shorter than `count`, if it cannot possibly fit the table
/// or if it visits the same sector twice
pub(crate) fn chain_prefix(
    table: &[u32],
    first: u32,
    count: u64,
    what: &str,
) -> Result<Vec<u32>, io::Error> {
    let count = usize::try_from(count)
        .ok()
        .filter(|count| *count <= table.len())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} chain of {} sectors exceeds the table size ({})",
                    what,
                    count,
                    table.len()
                ),
            )
        })?;
    let mut ret = Vec::with_capacity(count);
    let mut seen = vec![false; table.len()];
    let mut cur = first;
    while ret.len() < count {
        if seen.get(cur as usize).copied().unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} chain starting at {} loops back to sector {}",
                    what, first, cur
                ),
            ));
        }
        if let Some(v) = seen.get_mut(cur as usize) {
            *v = true;
        }
        if cur > MAXREGSECT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} chain starting at {} ends with 0x{:x} after {} of {} sectors",
                    what,
                    first,
                    cur,
                    ret.len(),
                    count
                ),
            ));
        }
        ret.push(cur);
        if ret.len() < count {
            cur = next_sector(table, cur, first, what)?;
        }
    }
    Ok(ret)
}

fn next_sector(table: &[u32], sector: u32, first: u32, what: &str) -> Result<u32, io::Error> {
    match table.get(sector as usize).copied() {
        Some(next) if next <= MAXREGSECT || next == ENDOFCHAIN => Ok(next),
        Some(next) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} chain starting at {} reaches special sector 0x{:x}",
                what, first, next
            ),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} chain starting at {} is out of table at sector {}",
                what, first, sector
            ),
        )),
    }
}
