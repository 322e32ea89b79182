//! Remote document fetch.
//!
//! [`HttpFetch`] is a single blocking `GET`. The status is returned, not
//! interpreted: deciding what a non-success status means belongs to the
//! input resolver.

use crate::error::FetchError;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Status and body of a completed `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

/// Blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: Option<u64>,
}

impl ReqwestFetcher {
    /// No timeout unless `timeout_secs` is given.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let map_err = |e: reqwest::Error| match (e.is_timeout(), self.timeout_secs) {
            (true, Some(secs)) => FetchError::Timeout { secs },
            _ => FetchError::Transport(e.to_string()),
        };

        let response = self.client.get(url).send().map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(map_err)?.to_vec();
        debug!(status, bytes = body.len(), "Fetched remote document");

        Ok(FetchedBody { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let ok = FetchedBody {
            status: 204,
            body: Vec::new(),
        };
        assert!(ok.is_success());
        let missing = FetchedBody {
            status: 404,
            body: b"not found".to_vec(),
        };
        assert!(!missing.is_success());
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let fetcher = ReqwestFetcher::new(Some(2)).unwrap();
        let err = fetcher.get("http://127.0.0.1:1/doc.pdf").unwrap_err();
        assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout { .. }));
    }
}
