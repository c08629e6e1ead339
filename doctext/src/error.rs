use std::io;
use thiserror::Error;

/// The error type of the text extractor
#[derive(Error, Debug)]
pub enum DocError {
    /// The input could not be read
    #[error("IO error: {0}")]
    Io(io::Error),

    /// A structure of the container or of the document is invalid
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A required stream is not present
    #[error("missing stream: {0}")]
    MissingStream(String),

    /// The container holds no Word document
    #[error("not a Word document")]
    NotWordDocument,

    /// The document is encrypted or obfuscated
    #[error("the document is encrypted")]
    Encrypted,

    /// A configuration value is out of bounds
    #[error("config parameter `{parameter}` value is out of bounds: {message}")]
    ConfigParameterValue {
        /// Parameter name
        parameter: &'static str,
        /// Error message
        message: String,
    },

    /// Wrapper for [`Figment::Error`](https://docs.rs/figment/latest/figment/struct.Error.html)
    #[error("config deserialization: {0:?}")]
    ConfigDeserialization(#[from] figment::Error),
}

impl From<io::Error> for DocError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                Self::InvalidData(e.to_string())
            }
            _ => Self::Io(e),
        }
    }
}

impl DocError {
    /// Whether the error is due to the content of the input rather than to its access
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidData(_) | Self::MissingStream(_) | Self::NotWordDocument | Self::Encrypted
        )
    }
}
