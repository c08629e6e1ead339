//! Facilities for reading runtime configuration values
use crate::DocError;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use tracing::trace;

const MIN_STREAM_SIZE: u64 = 4096;

/// Text extractor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum size in bytes of a stream to load
    pub max_stream_size: u64,

    /// Whether paragraph marks are returned as `\n` rather than `\r`
    pub paragraph_newlines: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_stream_size: 256 * 1024 * 1024,
            paragraph_newlines: false,
        }
    }
}

impl Config {
    /// Constructs `Config` from a `toml` file and environment variables
    ///
    /// Values come from `doctext.toml` and from `DOCTEXT__*` environment variables
    /// (e.g. `DOCTEXT__MAX_STREAM_SIZE`); missing values take their default
    pub fn new() -> Result<Self, DocError> {
        let config: Self = Figment::new()
            .merge(Toml::file("doctext.toml"))
            .merge(Env::prefixed("DOCTEXT__").split("__"))
            .extract()?;
        config.validate()?;
        trace!("final config: {config:#?}");
        Ok(config)
    }

    /// Checks that the values are within bounds
    pub fn validate(&self) -> Result<(), DocError> {
        macro_rules! disallow_value_below {
            ($parent:ident.$var:ident, $limit:expr) => {
                if $parent.$var < $limit {
                    Err(DocError::ConfigParameterValue {
                        parameter: stringify!($var),
                        message: format!(
                            "parameter value should be equal or larger than {}",
                            $limit
                        ),
                    })?
                }
            };
        }
        disallow_value_below!(self.max_stream_size, MIN_STREAM_SIZE);

        macro_rules! disallow_value_above {
            ($parent:ident.$var:ident, $limit:expr) => {
                if $parent.$var > $limit as _ {
                    Err(DocError::ConfigParameterValue {
                        parameter: stringify!($var),
                        message: format!("parameter value should be equal or less than {}", $limit),
                    })?
                }
            };
        }
        disallow_value_above!(self.max_stream_size, u32::MAX);
        Ok(())
    }
}
