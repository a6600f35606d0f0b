//! Input sources.

use std::io::Read;
use std::path::PathBuf;

use snip_core::{Error, Result};
use tracing::debug;

use crate::options::CredentialsMode;

/// Hard cap on fetched source size (2 GiB); the pipeline is in-memory.
const MAX_SOURCE_BYTES: u64 = 2 << 30;

/// Where the source container comes from.
pub enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Url(String),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Resolve the source to its bytes.
    pub(crate) fn fetch(
        self,
        credentials: CredentialsMode,
        authorization: Option<&str>,
    ) -> Result<Vec<u8>> {
        match self {
            Source::Bytes(data) => Ok(data),
            Source::Path(path) => Ok(std::fs::read(path)?),
            Source::Url(url) => fetch_url(&url, credentials, authorization),
        }
    }
}

fn fetch_url(
    url: &str,
    credentials: CredentialsMode,
    authorization: Option<&str>,
) -> Result<Vec<u8>> {
    debug!(url, "fetching source");
    let mut request = ureq::get(url);
    if credentials == CredentialsMode::Include {
        if let Some(token) = authorization {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
    }

    let response = request.call().map_err(|err| match err {
        ureq::Error::Status(status, _) => Error::Network {
            status: Some(status),
            message: format!("fetching {url}"),
        },
        ureq::Error::Transport(transport) => Error::Network {
            status: None,
            message: transport.to_string(),
        },
    })?;

    let mut data = Vec::new();
    response
        .into_reader()
        .take(MAX_SOURCE_BYTES)
        .read_to_end(&mut data)
        .map_err(|err| Error::Network {
            status: None,
            message: err.to_string(),
        })?;
    Ok(data)
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}
