//! # Word Binary File Format text extractor (.doc)
//!
//! This crate extracts the text a user would see from *Word Binary File Format*
//! documents, without any office runtime
//!
//! Word Binary files are *Compound File Binary Format* structures: check the [ctxole]
//! crate for details
//!
//! The main interface documentation and code examples are under the [Doc] struct
//!
//! The implementation is based on
//! [\[MS-DOC\]](https://docs.microsoft.com/en-us/openspecs/office_file_formats/ms-doc/ccd7b486-7881-484c-a137-51170af7cc22)
//!

#![warn(missing_docs)]

pub mod clx;
pub mod config;
mod error;
pub mod fib;
pub mod fkp;
pub mod plc;
pub mod sprm;
pub mod text;
pub mod visibility;

pub use config::Config;
pub use error::DocError;

use ctxole::Ole;
use fib::Fib;
use fkp::{ChpxFkp, PapxFkp};
use plc::PropertyCache;
use std::cell::OnceCell;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use text::{TextOptions, WordModel};
use tracing::{debug, warn};

const WORD_DOCUMENT: &str = "WordDocument";
const DATA: &str = "Data";
const OBJECT_POOL: &str = "ObjectPool";

/// A legacy Word document
///
/// The container structures are parsed when the document is created; the Word
/// structures are parsed on the first call to [`get_text`](Doc::get_text) and kept
///
/// # Examples
/// ```no_run
/// use doctext::Doc;
///
/// let doc = Doc::open("MyDocument.doc").unwrap();
/// if doc.is_valid_word_doc() {
///     println!("{}", doc.get_text().unwrap());
/// }
/// doc.close();
/// ```
///
/// # Errors
/// Failures are reported as [`DocError`]; structural problems of the input are
/// told apart by [`DocError::is_data_error`]
pub struct Doc<R: Read + Seek> {
    ole: Ole<R>,
    config: Config,
    storage: String,
    word_document: Option<Vec<u8>>,
    model: OnceCell<WordModel>,
}

impl Doc<BufReader<File>> {
    /// Opens the document at `path` with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DocError> {
        Self::open_with_config(path, &Config::default())
    }

    /// Opens the document at `path`
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self, DocError> {
        let f = File::open(path.as_ref())?;
        Self::with_config(BufReader::new(f), config)
    }
}

impl<R: Read + Seek> Doc<R> {
    /// Parses the container with the default configuration
    pub fn new(reader: R) -> Result<Self, DocError> {
        Self::with_config(reader, &Config::default())
    }

    /// Parses the container and locates the main WordDocument stream
    pub fn with_config(reader: R, config: &Config) -> Result<Self, DocError> {
        let ole = Ole::new(reader)?;
        let main = ole
            .find_stream(WORD_DOCUMENT)
            .into_iter()
            .find(|found| !found.path.contains(OBJECT_POOL));
        let mut ret = Self {
            ole,
            config: config.clone(),
            storage: String::new(),
            word_document: None,
            model: OnceCell::new(),
        };
        if let Some(found) = main {
            debug!("Main {} stream found at {}", WORD_DOCUMENT, found.path);
            ret.storage = match found.path.rsplit_once('\\') {
                Some((storage, _)) => storage.to_string(),
                None => found.path.clone(),
            };
            ret.word_document = ret.read_stream(found.id)?;
        } else {
            debug!("No {} stream found", WORD_DOCUMENT);
        }
        Ok(ret)
    }

    /// Returns the underlying container
    pub fn ole(&self) -> &Ole<R> {
        &self.ole
    }

    /// Returns whether the container holds a Word document
    pub fn is_valid_word_doc(&self) -> bool {
        self.word_document
            .as_deref()
            .is_some_and(fib::has_word_ident)
    }

    /// Returns the File Information Block
    pub fn fib(&self) -> Result<&Fib, DocError> {
        Ok(&self.model()?.fib)
    }

    /// Extracts the visible text of the main document
    pub fn get_text(&self) -> Result<String, DocError> {
        let wd = self.valid_word_document()?;
        let model = self.model()?;
        let options = TextOptions {
            paragraph_newlines: self.config.paragraph_newlines,
        };
        Ok(model.text(wd, options)?)
    }

    /// Releases the document and its reader
    pub fn close(self) {
        debug!("Closing document");
    }

    fn valid_word_document(&self) -> Result<&[u8], DocError> {
        match self.word_document.as_deref() {
            Some(wd) if fib::has_word_ident(wd) => Ok(wd),
            _ => Err(DocError::NotWordDocument),
        }
    }

    fn model(&self) -> Result<&WordModel, DocError> {
        if let Some(model) = self.model.get() {
            return Ok(model);
        }
        let model = self.load_model()?;
        Ok(self.model.get_or_init(|| model))
    }

    fn load_model(&self) -> Result<WordModel, DocError> {
        let wd = self.valid_word_document()?;
        let fib = Fib::parse(wd)?;
        if fib.fEncrypted || fib.fObfuscated {
            return Err(DocError::Encrypted);
        }
        debug!("{:?}", fib);

        let table = match self.stream_id(fib.table_name()) {
            Some(id) => id,
            None => {
                let id = self.stream_id(fib.other_table_name()).ok_or_else(|| {
                    DocError::MissingStream(fib.table_name().to_string())
                })?;
                warn!(
                    "Table stream {} is missing, using {}",
                    fib.table_name(),
                    fib.other_table_name()
                );
                id
            }
        };
        let table = self
            .read_stream(table)?
            .ok_or_else(|| DocError::MissingStream(fib.table_name().to_string()))?;
        let clx = clx::Clx::parse(ctxutils::io::slice_at(
            &table,
            fib.fcClx.into(),
            fib.lcbClx.into(),
        )?)?;
        let chpx = PropertyCache::load(
            wd,
            &table,
            fib.fcPlcfBteChpx,
            fib.lcbPlcfBteChpx,
            ChpxFkp::parse,
        )?;
        // only read when a paragraph property is redirected
        let data: OnceCell<Vec<u8>> = OnceCell::new();
        let papx = PropertyCache::load(
            wd,
            &table,
            fib.fcPlcfBtePapx,
            fib.lcbPlcfBtePapx,
            |page| PapxFkp::parse(page, &|| self.data_stream(&data)),
        )
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DocError::MissingStream(DATA.to_string())
            } else {
                e.into()
            }
        })?;
        debug!(
            "Word model loaded: {} pieces, ccpText {}",
            clx.Pcdt.aPcd.len(),
            fib.ccpText
        );
        Ok(WordModel {
            fib,
            clx,
            chpx,
            papx,
        })
    }

    fn data_stream<'a>(&self, cache: &'a OnceCell<Vec<u8>>) -> Result<&'a [u8], io::Error> {
        if let Some(data) = cache.get() {
            return Ok(data);
        }
        let data = self
            .stream_id(DATA)
            .map(|id| self.read_stream(id))
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Properties refer to a missing {} stream", DATA),
                )
            })?;
        debug!("{} stream loaded ({} bytes)", DATA, data.len());
        Ok(cache.get_or_init(|| data))
    }

    fn stream_id(&self, name: &str) -> Option<u32> {
        self.ole
            .get_path_id(&format!("{}\\{}", self.storage, name))
            .filter(|id| self.ole.entry(*id).is_some_and(|e| e.is_stream()))
    }

    fn read_stream(&self, id: u32) -> Result<Option<Vec<u8>>, io::Error> {
        if let Some(entry) = self.ole.entry(id) {
            if entry.size > self.config.max_stream_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Stream {} is too large ({} bytes, limit {})",
                        entry.name, entry.size, self.config.max_stream_size
                    ),
                ));
            }
        }
        self.ole.read_stream(id)
    }
}

/// A text extractor for a document format
pub trait TextExtractor {
    /// Extracts the text of the document at `path`
    fn extract_text(&self, path: &Path) -> Result<String, DocError>;
}

/// The [`TextExtractor`] for legacy Word documents
#[derive(Debug, Clone, Default)]
pub struct DocExtractor {
    config: Config,
}

impl DocExtractor {
    /// Creates an extractor with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl TextExtractor for DocExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, DocError> {
        let doc = Doc::open_with_config(path, &self.config)?;
        let text = doc.get_text()?;
        doc.close();
        Ok(text)
    }
}
