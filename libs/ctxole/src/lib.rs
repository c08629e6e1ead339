//! # A library to read Ole files
//!
//! Provide functionality to read objects in the *Compound File Binary Format*
//!
//! The implementation is based upon
//! [\[MS-CFB\]](https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/53989ce4-7b05-4f8d-829b-d08d6148375b).
//! Structures which cannot be used to safely locate data are rejected; minor
//! divergences from the format are tolerated and reported as anomalies
//!
//! See [Ole] for the main interface documentation and code examples
//!

#![warn(missing_docs)]

mod alloc;
pub mod directory;
pub mod header;

pub use directory::{EntryType, FoundEntry, OleEntry};
pub use header::OleHeader;

use directory::Directory;
use std::cell::{OnceCell, RefCell};
use std::io::{self, Read, Seek};
use tracing::debug;

pub(crate) const DIFSECT: u32 = 0xfffffffc;
pub(crate) const FATSECT: u32 = 0xfffffffd;
pub(crate) const ENDOFCHAIN: u32 = 0xfffffffe;
pub(crate) const FREESECT: u32 = 0xffffffff;
pub(crate) const MAXREGSECT: u32 = 0xfffffffa;
pub(crate) const MAXREGSID: u32 = 0xfffffffa;
pub(crate) const NOSTREAM: u32 = 0xffffffff;

const MINI_SECTOR_SIZE: u64 = 64;

/// The parser and stream reader for Ole objects
///
/// All the allocation tables and the directory are loaded when the object
/// is created; stream data is only read on request
///
/// # Examples
/// ```no_run
/// use ctxole::Ole;
/// use std::fs::File;
/// use std::io::BufReader;
///
/// let f = File::open("MyDocument.doc").unwrap();
/// let ole = Ole::new(BufReader::new(f)).unwrap();
/// for found in ole.find_stream("WordDocument") {
///     let data = ole.read_stream(found.id).unwrap().unwrap();
///     println!("{}: {} bytes", found.path, data.len());
/// }
/// ```
///
/// # Errors
/// Most fuctions return a [`Result<T, std::io::Error>`]
/// * Errors from the IO layer are bubbled
/// * Errors generated in the parser are reported with [`ErrorKind`](std::io::ErrorKind)
///   set to [`InvalidData`](std::io::ErrorKind#variant.InvalidData)
///
pub struct Ole<R: Read + Seek> {
    f: RefCell<R>,
    header: OleHeader,
    anomalies: Vec<String>,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    directory: Directory,
    mini_stream: OnceCell<Vec<u8>>,
}

impl<R: Read + Seek> Ole<R> {
    /// Parses an Ole object and collects the relevant characteristics
    pub fn new(mut f: R) -> Result<Self, io::Error> {
        let mut buf = [0u8; header::HEADER_SIZE];
        f.seek(io::SeekFrom::Start(0))?;
        f.read_exact(&mut buf)?;
        let header = OleHeader::parse(&buf)?;
        let mut anomalies = header.anomalies.clone();
        let sector_size = header.sector_size();

        let difat = alloc::build_difat(
            &header,
            |sector| read_sector(&mut f, sector_size, sector, sector_size as usize),
            &mut anomalies,
        )?;
        let fat = alloc::build_fat(
            &header,
            &difat,
            |sector| read_sector(&mut f, sector_size, sector, sector_size as usize),
            &mut anomalies,
        )?;
        let minifat = alloc::build_minifat(
            &header,
            &fat,
            |sector| read_sector(&mut f, sector_size, sector, sector_size as usize),
            &mut anomalies,
        )?;

        let dir_chain = alloc::walk_chain(&fat, header.first_dir_sector, "Directory")?;
        if header.major_version == 4
            && u32::try_from(dir_chain.len()).ok() != Some(header.dir_sectors)
        {
            anomalies.push(format!(
                "Directory has {} sectors but {} are declared in the header",
                dir_chain.len(),
                header.dir_sectors
            ));
        }
        let mut dir_data: Vec<u8> = Vec::new();
        for sector in dir_chain {
            dir_data.extend(read_sector(&mut f, sector_size, sector, sector_size as usize)?);
        }
        let directory = Directory::parse(&dir_data, header.major_version)?;
        let root = directory.root();
        if root.name != "Root Entry" {
            anomalies.push(format!("Root Entry name is \"{}\"", root.name));
        }
        if root.color != 1 {
            anomalies.push("Root Entry color is not black".to_string());
        }
        anomalies.extend(
            (0..directory.len())
                .filter_map(|id| directory.get(id as u32))
                .flat_map(|e| e.anomalies.iter().map(move |a| format!("Entry {}: {}", e.id, a))),
        );

        debug!(
            "Ole v{}.{:x}: sector size {}, {} DIFAT entries, {} FAT entries, {} miniFAT entries, {} directory entries",
            header.major_version,
            header.minor_version,
            sector_size,
            difat.len(),
            fat.len(),
            minifat.len(),
            directory.len()
        );
        for anomaly in anomalies.iter() {
            debug!("Ole anomaly: {}", anomaly);
        }

        Ok(Self {
            f: RefCell::new(f),
            header,
            anomalies,
            fat,
            minifat,
            directory,
            mini_stream: OnceCell::new(),
        })
    }

    /// Returns the major and minor versions of the Ole structure as a tuple
    pub fn version(&self) -> (u16, u16) {
        (self.header.major_version, self.header.minor_version)
    }

    /// Returns the sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.header.sector_size()
    }

    /// Returns the parsed header
    pub fn header(&self) -> &OleHeader {
        &self.header
    }

    /// Lists the anomalies detected in the main Ole structures
    pub fn anomalies(&self) -> &[String] {
        self.anomalies.as_slice()
    }

    /// Returns the number of entries in the Ole structure
    pub fn num_entries(&self) -> u32 {
        self.directory.len() as u32
    }

    /// Returns the entry with the given id
    pub fn entry(&self, id: u32) -> Option<&OleEntry> {
        self.directory.get(id)
    }

    /// Returns the Root Entry
    pub fn root(&self) -> &OleEntry {
        self.directory.root()
    }

    /// Resolves a `\` separated path (e.g. `Root Entry\WordDocument`) into an entry id
    pub fn get_path_id(&self, path: &str) -> Option<u32> {
        self.directory.get_path_id(path)
    }

    /// Finds all the entries with the given name, together with their full path
    pub fn find_stream(&self, name: &str) -> Vec<FoundEntry> {
        self.directory.find_stream(name)
    }

    /// Reads the whole content of a stream
    ///
    /// Returns `Ok(None)` if `id` is not a stream entry
    pub fn read_stream(&self, id: u32) -> Result<Option<Vec<u8>>, io::Error> {
        let entry = match self.directory.get(id) {
            Some(entry) if entry.is_stream() => entry,
            _ => return Ok(None),
        };
        if entry.size == 0 {
            return Ok(Some(Vec::new()));
        }
        if entry.size >= u64::from(self.header.mini_stream_cutoff) {
            self.read_regular_stream(entry.start_sector, entry.size, "Stream")
                .map(Some)
        } else {
            self.read_mini_stream(entry.start_sector, entry.size)
                .map(Some)
        }
    }

    fn read_regular_stream(&self, first: u32, size: u64, what: &str) -> Result<Vec<u8>, io::Error> {
        let sector_size = u64::from(self.sector_size());
        let chain = alloc::chain_prefix(&self.fat, first, size.div_ceil(sector_size), what)?;
        let mut ret: Vec<u8> = Vec::with_capacity(chain.len() * sector_size as usize);
        let mut remaining = size;
        let mut f = self.f.borrow_mut();
        for sector in chain {
            let len = remaining.min(sector_size);
            ret.extend(read_sector(
                &mut *f,
                self.sector_size(),
                sector,
                len as usize, // Safe: len <= sector_size
            )?);
            remaining -= len;
        }
        Ok(ret)
    }

    fn mini_stream(&self) -> Result<&[u8], io::Error> {
        if let Some(data) = self.mini_stream.get() {
            return Ok(data);
        }
        let root = self.directory.root();
        let data = if root.size == 0 {
            Vec::new()
        } else {
            self.read_regular_stream(root.start_sector, root.size, "Mini stream")?
        };
        debug!("Mini stream loaded ({} bytes)", data.len());
        Ok(self.mini_stream.get_or_init(|| data))
    }

    fn read_mini_stream(&self, first: u32, size: u64) -> Result<Vec<u8>, io::Error> {
        let mini_stream = self.mini_stream()?;
        let chain = alloc::chain_prefix(
            &self.minifat,
            first,
            size.div_ceil(MINI_SECTOR_SIZE),
            "MiniFAT",
        )?;
        let mut ret: Vec<u8> = Vec::with_capacity(size as usize); // Safe: size < cutoff
        let mut remaining = size;
        for mini_sector in chain {
            let len = remaining.min(MINI_SECTOR_SIZE);
            let data = ctxutils::io::slice_at(
                mini_stream,
                u64::from(mini_sector) * MINI_SECTOR_SIZE,
                len,
            )
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Mini sector {} is outside the mini stream", mini_sector),
                )
            })?;
            ret.extend_from_slice(data);
            remaining -= len;
        }
        Ok(ret)
    }
}

fn read_sector<R: Read + Seek>(
    f: &mut R,
    sector_size: u32,
    sector: u32,
    len: usize,
) -> Result<Vec<u8>, io::Error> {
    if sector > MAXREGSECT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Cannot seek to special sector 0x{:x}", sector),
        ));
    }
    let offset = (u64::from(sector) + 1) * u64::from(sector_size); // always safe
    f.seek(io::SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    f.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Sector {} is outside the file", sector),
            )
        } else {
            e
        }
    })?;
    Ok(buf)
}
