use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL {0:?}")]
    InvalidUrl(String),

    #[error("no data directory available for the icon cache")]
    NoDataDir,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http { url: url.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
