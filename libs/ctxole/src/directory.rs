//! The *Compound File Directory*
use crate::{MAXREGSID, NOSTREAM};
use ctxutils::io::ByteCursor;
use ctxutils::win32::{filetime_to_datetime, GUID};
use std::io;
use time::OffsetDateTime;

/// Size in bytes of a directory entry
pub const DIR_ENTRY_SIZE: usize = 128;

/// The object type of a [directory entry](OleEntry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Unknown or unallocated
    Unknown,
    /// Storage object (directory)
    Storage,
    /// Stream object (file)
    Stream,
    /// The root storage
    Root,
}

impl From<u8> for EntryType {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Storage,
            2 => Self::Stream,
            5 => Self::Root,
            _ => Self::Unknown,
        }
    }
}

/// The representation of a *Compound File Directory Entry*
#[derive(Debug, Clone)]
pub struct OleEntry {
    /// The `id` of the entry
    pub id: u32,
    /// The `name` of the entry
    pub name: String,
    /// The object type of the entry
    pub objtype: EntryType,
    /// The red/black tree value of the entry
    pub color: u8,
    pub(crate) left: u32,
    pub(crate) right: u32,
    pub(crate) child: u32,
    /// The entry CLSID
    pub clsid: GUID,
    /// The state of the entry (typically for storage objects)
    pub state: u32,
    /// The creation time of the entry
    pub ctime: Option<OffsetDateTime>,
    /// The last modification time of the entry
    pub mtime: Option<OffsetDateTime>,
    pub(crate) start_sector: u32,
    /// The size (in bytes) of the entry
    pub size: u64,
    /// A list of non fatal incongruences found in the entry
    pub anomalies: Vec<String>,
}

impl OleEntry {
    fn unallocated(id: u32) -> Self {
        Self {
            id,
            name: String::new(),
            objtype: EntryType::Unknown,
            color: 0,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
            clsid: GUID::null(),
            state: 0,
            ctime: None,
            mtime: None,
            start_sector: 0,
            size: 0,
            anomalies: Vec::new(),
        }
    }

    fn parse(id: u32, buf: &[u8], major_version: u16) -> Result<Self, io::Error> {
        let mut c = ByteCursor::new(buf);
        let namebuf = c.take(64)?;
        let namelen = usize::from(c.rdu16le()?);
        let objtype_raw = c.rdu8()?;
        let mut ret = Self::unallocated(id);
        ret.objtype = EntryType::from(objtype_raw);
        if ret.objtype == EntryType::Unknown {
            if objtype_raw != 0 {
                ret.anomalies
                    .push(format!("Invalid object type {}", objtype_raw));
            }
            return Ok(ret);
        }
        if ret.objtype == EntryType::Root && id != 0 {
            ret.anomalies
                .push("Non Root Entry with a root type".to_string());
        }

        if namelen == 0 || namelen > 64 || namelen & 1 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Invalid directory entry {}: name length {} is invalid",
                    id, namelen
                ),
            ));
        }
        let mut name: Vec<u16> = namebuf[0..namelen]
            .chunks_exact(2)
            .map(|v| u16::from_le_bytes([v[0], v[1]]))
            .collect();
        if name.pop() != Some(0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid directory entry {}: name is not null terminated", id),
            ));
        }
        ret.name = String::from_utf16_lossy(&name);
        ret.color = c.rdu8()?;
        ret.left = c.rdu32le()?;
        ret.right = c.rdu32le()?;
        ret.child = c.rdu32le()?;
        if ret.objtype == EntryType::Stream && ret.child != NOSTREAM {
            ret.anomalies.push("Stream entry with a child".to_string());
        }
        ret.clsid = GUID::from_le_bytes(c.take(16)?).unwrap_or_default();
        ret.state = c.rdu32le()?;
        ret.ctime = filetime_to_datetime(c.rdu64le()?);
        ret.mtime = filetime_to_datetime(c.rdu64le()?);
        ret.start_sector = c.rdu32le()?;
        ret.size = c.rdu64le()?;
        if major_version == 3 {
            ret.size &= 0xffffffff;
        }
        if ret.objtype == EntryType::Storage && ret.size > 0 {
            ret.anomalies.push("Storage object with data".to_string());
        }
        Ok(ret)
    }

    /// Returns [true] if the entry is allocated, [false] otherwise
    pub fn is_allocated(&self) -> bool {
        self.objtype != EntryType::Unknown
    }

    /// Returns [true] if the entry is a Storage Object or the Root Entry
    pub fn is_storage(&self) -> bool {
        matches!(self.objtype, EntryType::Storage | EntryType::Root)
    }

    /// Returns [true] if the entry is a Stream Object
    pub fn is_stream(&self) -> bool {
        self.objtype == EntryType::Stream
    }

    fn link(&self, id: u32) -> Option<u32> {
        if self.is_allocated() && id <= MAXREGSID {
            Some(id)
        } else {
            None
        }
    }

    /// The left sibling id
    pub fn left(&self) -> Option<u32> {
        self.link(self.left)
    }

    /// The right sibling id
    pub fn right(&self) -> Option<u32> {
        self.link(self.right)
    }

    /// The first child id (storage objects only)
    pub fn child(&self) -> Option<u32> {
        if self.is_storage() {
            self.link(self.child)
        } else {
            None
        }
    }
}

/// An entry found by [`Directory::find_stream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEntry {
    /// The `\` separated path of the entry, starting with the root name
    pub path: String,
    /// The entry id
    pub id: u32,
}

/// The array of directory entries, indexed by id
#[derive(Debug)]
pub struct Directory {
    entries: Vec<OleEntry>,
}

impl Directory {
    /// Parses the directory from the concatenation of its sectors
    pub(crate) fn parse(data: &[u8], major_version: u16) -> Result<Self, io::Error> {
        let entries = data
            .chunks_exact(DIR_ENTRY_SIZE)
            .enumerate()
            .map(|(id, buf)| OleEntry::parse(id as u32, buf, major_version))
            .collect::<Result<Vec<OleEntry>, io::Error>>()?;
        match entries.first() {
            Some(root) if root.objtype == EntryType::Root => Ok(Self { entries }),
            Some(root) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid Root Entry: type is {:?}", root.objtype),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Empty directory",
            )),
        }
    }

    /// Returns the number of entries, including unallocated ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns [true] if the directory holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry with the given id
    pub fn get(&self, id: u32) -> Option<&OleEntry> {
        self.entries.get(usize::try_from(id).ok()?)
    }

    /// Returns the root entry
    pub fn root(&self) -> &OleEntry {
        &self.entries[0]
    }

    /// Resolves a `\` separated path into an entry id
    ///
    /// The path starts with the root name (e.g. `Root Entry\WordDocument`); names are
    /// compared case insensitively. At each level the sibling tree is descended by
    /// comparing the name length first and the uppercased names next
    pub fn get_path_id(&self, path: &str) -> Option<u32> {
        let path = path.to_uppercase();
        let mut parts = path.split('\\').peekable();
        let mut cur = 0u32;
        while let Some(part) = parts.next() {
            let part_len = part.encode_utf16().count();
            let mut steps = 0usize;
            loop {
                steps += 1;
                if steps > self.entries.len() + 1 {
                    return None;
                }
                let entry = self.get(cur).filter(|e| e.is_allocated())?;
                let name = entry.name.to_uppercase();
                let name_len = name.encode_utf16().count();
                let next = if part_len < name_len {
                    entry.left()
                } else if part_len > name_len {
                    entry.right()
                } else if part < name.as_str() {
                    entry.left()
                } else if part > name.as_str() {
                    entry.right()
                } else {
                    break;
                };
                cur = next?;
            }
            if parts.peek().is_some() {
                cur = self.get(cur)?.child()?;
            }
        }
        Some(cur)
    }

    /// Finds every entry named `name`, anywhere in the tree
    ///
    /// The tree is walked depth first (child, left sibling, right sibling) regardless
    /// of the sibling ordering; an empty result means no such entry exists
    pub fn find_stream(&self, name: &str) -> Vec<FoundEntry> {
        let mut ret = Vec::new();
        let mut seen = vec![false; self.entries.len()];
        let mut stack: Vec<(u32, String)> = vec![(0, String::new())];
        while let Some((id, parent)) = stack.pop() {
            let entry = match self.get(id) {
                Some(e) if e.is_allocated() && !seen[id as usize] => e,
                _ => continue,
            };
            seen[id as usize] = true;
            let path = if parent.is_empty() {
                entry.name.clone()
            } else {
                format!("{}\\{}", parent, entry.name)
            };
            // Popped in reverse push order: child, then left, then right
            if let Some(right) = entry.right() {
                stack.push((right, parent.clone()));
            }
            if let Some(left) = entry.left() {
                stack.push((left, parent));
            }
            if let Some(child) = entry.child() {
                stack.push((child, path.clone()));
            }
            if entry.name == name {
                ret.push(FoundEntry { path, id });
            }
        }
        ret
    }
}
