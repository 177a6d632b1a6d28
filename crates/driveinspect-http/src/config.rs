//! Transport configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest page the service accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HttpConfigError {
    #[error("Base URL '{0}' is not an http(s) URL")]
    InvalidBaseUrl(String),

    #[error("Page size {0} outside 1..=1000")]
    InvalidPageSize(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Root of the Drive v3 API, with or without the trailing slash.
    pub base_url: String,
    /// `pageSize` sent with every listing request.
    pub page_size: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl HttpConfig {
    /// Check the settings and normalize the base URL to end in `/`.
    pub fn validated(mut self) -> Result<Self, HttpConfigError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(HttpConfigError::InvalidBaseUrl(self.base_url));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(HttpConfigError::InvalidPageSize(self.page_size));
        }
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        Ok(self)
    }
}
