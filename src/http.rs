//! HTTP transport used by discovery, resolvers, and the fetcher.
//!
//! The [`Transport`] trait is the seam between the pipeline and the network.
//! [`ReqwestTransport`] is the production implementation: a blocking
//! `reqwest` client with a fixed User-Agent and a per-request timeout that
//! covers both connecting and reading the body, so a stalled server can only
//! hold one worker for `timeout` before the post is dropped.
//!
//! Tests use [`tests::MockTransport`], which serves canned bodies from memory
//! and records every request.

use std::io::Write;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is no longer available")]
    Gone { url: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking HTTP operations the crawler needs.
pub trait Transport: Send + Sync {
    /// GET `url` with extra headers and return the body as text.
    fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, HttpError>;

    /// POST a form with HTTP basic auth and return the body as text.
    fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<String, HttpError>;

    /// GET `url` and stream the body into `sink`. Returns the byte count.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, HttpError>;
}

/// Placeholder imgur serves (with a redirect) for deleted images.
const IMGUR_REMOVED_PATH: &str = "/removed.png";

/// Whether a (post-redirect) response URL is imgur's "removed" placeholder.
pub fn is_removed_placeholder(url: &url::Url) -> bool {
    let imgur = url
        .host_str()
        .is_some_and(|h| h == "imgur.com" || h.ends_with(".imgur.com"));
    imgur && url.path() == IMGUR_REMOVED_PATH
}

/// [`Transport`] backed by `reqwest::blocking`.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|source| HttpError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    fn send(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, HttpError> {
        let response = request.send().map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Transport for ReqwestTransport {
    fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, HttpError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self.send(url, request)?;
        response.text().map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })
    }

    fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<String, HttpError> {
        let request = self
            .client
            .post(url)
            .basic_auth(basic_auth.0, Some(basic_auth.1))
            .form(form);
        let response = self.send(url, request)?;
        response.text().map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, HttpError> {
        let mut response = self.send(url, self.client.get(url))?;
        if is_removed_placeholder(response.url()) {
            return Err(HttpError::Gone {
                url: url.to_string(),
            });
        }
        response.copy_to(sink).map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })
    }
}
