//! The external rates feed boundary.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Wire shape of the rates endpoint. `date` is carried through but unused.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesResponse {
    pub base: String,
    pub date: String,
    pub rates: HashMap<String, f64>,
}

/// Why a fetch failed. Transport failures are the ones worth checking against
/// connectivity before telling the user anything technical.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Host unreachable, connection refused, or timeout.
    #[error("network error: {0}")]
    Transport(String),
    /// Everything else the endpoint can do wrong: HTTP errors, bad JSON.
    #[error("{0}")]
    Api(String),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            FetchError::Transport(err.to_string())
        } else {
            FetchError::Api(err.to_string())
        }
    }
}

#[async_trait]
pub trait RatesSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RatesResponse, FetchError>;
}
