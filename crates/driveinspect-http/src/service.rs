//! Blocking Drive v3 client.

use crate::config::{HttpConfig, HttpConfigError};
use driveinspect_core::node::{Node, NodeId, NodePage, STANDARD_FIELDS};
use driveinspect_core::remote::{DriveService, ListQuery, RemoteError};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, instrument, trace};

/// [`DriveService`] over the Drive v3 REST API.
///
/// Holds an already-acquired OAuth bearer token; acquiring and refreshing
/// it is the caller's business. One request per call, no retries.
pub struct DriveHttpService {
    agent: ureq::Agent,
    config: HttpConfig,
    token: SecretString,
}

impl fmt::Debug for DriveHttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveHttpService")
            .field("base_url", &self.config.base_url)
            .field("page_size", &self.config.page_size)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl DriveHttpService {
    pub fn new(config: HttpConfig, token: SecretString) -> Result<Self, HttpConfigError> {
        Ok(Self {
            agent: ureq::Agent::new_with_defaults(),
            config: config.validated()?,
            token,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// `{base}files/{id}`
    pub fn file_url(&self, id: &NodeId) -> String {
        format!("{}files/{id}", self.config.base_url)
    }

    /// `{base}files`
    pub fn list_url(&self) -> String {
        format!("{}files", self.config.base_url)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// `fields` selector for listing requests.
pub fn list_fields() -> String {
    format!("nextPageToken, files({STANDARD_FIELDS})")
}

/// Query parameters of one listing request.
pub fn list_params(
    query: &ListQuery,
    page_token: Option<&str>,
    page_size: u32,
) -> Vec<(&'static str, String)> {
    let mut params = vec![("fields", list_fields()), ("pageSize", page_size.to_string())];
    if let Some(predicate) = query.predicate() {
        params.push(("q", predicate));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

/// Translate a client error. A 404 is a missing node when the request was
/// about one.
pub fn map_error(err: ureq::Error, id: Option<&NodeId>) -> RemoteError {
    match (err, id) {
        (ureq::Error::StatusCode(404), Some(id)) => RemoteError::NotFound { id: id.clone() },
        (ureq::Error::StatusCode(status), _) => RemoteError::Service {
            status,
            message: ureq::http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unexpected status")
                .to_string(),
        },
        (ureq::Error::Json(e), _) => RemoteError::Decode(e.to_string()),
        (other, _) => RemoteError::Transport(other.to_string()),
    }
}

impl DriveService for DriveHttpService {
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    fn get(&self, id: &NodeId) -> Result<Node, RemoteError> {
        let url = self.file_url(id);
        trace!(url = %url, "GET file");
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.authorization())
            .query("fields", STANDARD_FIELDS)
            .call()
            .map_err(|e| map_error(e, Some(id)))?;

        response
            .body_mut()
            .read_json::<Node>()
            .map_err(|e| map_error(e, Some(id)))
    }

    #[instrument(level = "debug", skip(self, page_token), fields(op = %query.op()))]
    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<NodePage, RemoteError> {
        let params = list_params(query, page_token, self.config.page_size);
        let mut response = self
            .agent
            .get(&self.list_url())
            .header("Authorization", &self.authorization())
            .query_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .call()
            .map_err(|e| map_error(e, None))?;

        let page = response
            .body_mut()
            .read_json::<NodePage>()
            .map_err(|e| map_error(e, None))?;
        debug!(
            files = page.files.len(),
            more = page.next_page_token.is_some(),
            "Received page"
        );
        Ok(page)
    }
}
