//! Win32 structs and fns
use std::fmt::{self, Debug, Display};

/// A Win32 GUID, kept in its on-disk (little endian) layout
#[derive(PartialEq, Eq, Clone, Copy, Default)]
pub struct GUID([u8; 16]);

impl GUID {
    /// Create a null (all zeroes) GUID
    pub fn null() -> Self {
        Self([0u8; 16])
    }

    /// Create a GUID from 16 raw bytes
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self(bytes.try_into().ok()?))
    }

    /// Check whether the GUID is null
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 16]
    }

    fn data1(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    fn data2(&self) -> u16 {
        u16::from_le_bytes([self.0[4], self.0[5]])
    }

    fn data3(&self) -> u16 {
        u16::from_le_bytes([self.0[6], self.0[7]])
    }
}

impl Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1(),
            self.data2(),
            self.data3(),
            self.0[8],
            self.0[9]
        )?;
        self.0[10..].iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self)
    }
}

/// Translates a windows FILETIME to a [datetime](time::OffsetDateTime)
///
/// Returns None for the zero FILETIME (unset) or if the date is out of range
pub fn filetime_to_datetime(ftime: u64) -> Option<time::OffsetDateTime> {
    if ftime == 0 {
        return None;
    }
    let ftime = i128::from(ftime).checked_sub(116444736000000000)?;
    time::OffsetDateTime::from_unix_timestamp_nanos(ftime * 100).ok()
}
