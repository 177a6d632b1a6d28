//! Google Drive v3 REST transport for `driveinspect-core`.
//!
//! [`DriveHttpService`] implements [`DriveService`](driveinspect_core::DriveService)
//! with blocking `ureq` requests:
//!
//! - `get`: `GET {base}files/{id}?fields=...`
//! - `list_page`: `GET {base}files?q=...&fields=nextPageToken, files(...)&pageToken=...&pageSize=...`
//!
//! HTTP 404 on a single-node fetch becomes `RemoteError::NotFound`, other
//! statuses `RemoteError::Service`, connection failures
//! `RemoteError::Transport` and undecodable bodies `RemoteError::Decode`.
//! The bearer token is kept in a [`SecretString`](secrecy::SecretString) and
//! never logged.

pub mod config;
pub mod service;

pub use config::{HttpConfig, HttpConfigError};
pub use service::DriveHttpService;
