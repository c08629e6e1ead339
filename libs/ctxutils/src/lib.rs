//! Miscellaneous helpers shared by the Ole and Word parsers
#![warn(missing_docs)]

pub mod io;
#[cfg(feature = "win32")]
pub mod win32;
