//! Discovery: the bounded candidate list the pipeline starts from.
//!
//! [`RedditSource`] reads a community's "top" listing for a time window,
//! follows the `after` cursor page by page, drops self posts (they carry no
//! link), applies the optional year filter, and stops once `limit` posts are
//! collected, the listing runs out, or `max_pages` requests were made.
//!
//! ## Access modes
//!
//! - **Anonymous**: `https://www.reddit.com/r/<sub>/top.json`.
//! - **OAuth**: with [`Credentials`], a password-grant token is requested from
//!   `https://www.reddit.com/api/v1/access_token` and listings are read from
//!   `https://oauth.reddit.com` with a bearer header.
//!
//! Any failure here aborts the run: a partial candidate list would silently
//! shrink the result set.

use crate::config::Credentials;
use crate::http::{HttpError, Transport};
use crate::types::Post;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const PUBLIC_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
/// Largest page size the listing endpoint accepts.
const PAGE_SIZE: usize = 100;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected listing: {0}")]
    Malformed(String),
    #[error("invalid listing URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Period of a "top" listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

/// What to ask the source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub subreddit: String,
    pub window: TimeWindow,
    pub limit: usize,
    pub year: Option<i32>,
    pub max_pages: usize,
}

impl DiscoveryQuery {
    /// Whether a post created at `created` passes the year filter.
    pub fn accepts(&self, created: &DateTime<Utc>) -> bool {
        self.year.is_none_or(|year| created.year() == year)
    }
}

/// A content source that can list candidate posts.
pub trait Source {
    fn discover(&self, query: &DiscoveryQuery) -> Result<Vec<Post>, DiscoveryError>;
}

/// Reddit listing client.
pub struct RedditSource<'a> {
    transport: &'a dyn Transport,
    credentials: Option<Credentials>,
}

impl<'a> RedditSource<'a> {
    pub fn new(transport: &'a dyn Transport, credentials: Option<Credentials>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Exchange credentials for a bearer token.
    fn access_token(&self, creds: &Credentials) -> Result<String, DiscoveryError> {
        let body = self
            .transport
            .post_form(
                TOKEN_URL,
                (creds.client_id.as_str(), creds.client_secret.as_str()),
                &[
                    ("grant_type", "password"),
                    ("username", creds.username.as_str()),
                    ("password", creds.password.as_str()),
                ],
            )
            .map_err(|e| match e {
                HttpError::Status { status: 401, .. } => {
                    DiscoveryError::Auth("client id or secret rejected".into())
                }
                other => DiscoveryError::Http(other),
            })?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        match (token.access_token, token.error) {
            (Some(t), _) if !t.is_empty() => Ok(t),
            (_, Some(err)) => Err(DiscoveryError::Auth(err)),
            _ => Err(DiscoveryError::Auth("no access token in response".into())),
        }
    }

    fn page_url(
        base: &str,
        query: &DiscoveryQuery,
        after: Option<&str>,
    ) -> Result<String, DiscoveryError> {
        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["r", query.subreddit.as_str(), "top.json"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("t", query.window.as_str())
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("raw_json", "1");
            if let Some(after) = after {
                pairs.append_pair("after", after);
            }
        }
        Ok(url.into())
    }
}

impl Source for RedditSource<'_> {
    fn discover(&self, query: &DiscoveryQuery) -> Result<Vec<Post>, DiscoveryError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let (base, auth_header) = match &self.credentials {
            Some(creds) => {
                let token = self.access_token(creds)?;
                info!(user = creds.username.as_str(), "authenticated");
                (OAUTH_BASE, Some(format!("bearer {token}")))
            }
            None => (PUBLIC_BASE, None),
        };
        let headers: Vec<(&str, &str)> = auth_header
            .as_deref()
            .map(|h| vec![("Authorization", h)])
            .unwrap_or_default();

        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        for page in 0..query.max_pages {
            let url = Self::page_url(base, query, after.as_deref())?;
            debug!(page, url = url.as_str(), "fetching listing page");
            let body = self.transport.get_text(&url, &headers)?;
            let listing: Listing = serde_json::from_str(&body)?;

            for child in listing.data.children {
                let Some(post) = child.data.into_post()? else {
                    continue;
                };
                if !query.accepts(&post.created_utc) {
                    continue;
                }
                posts.push(post);
                if posts.len() >= query.limit {
                    return Ok(posts);
                }
            }

            match listing.data.after {
                Some(next) if !next.is_empty() => after = Some(next),
                _ => break,
            }
        }

        Ok(posts)
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: LinkData,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    #[serde(default)]
    url: Option<String>,
    title: String,
    permalink: String,
    score: i64,
    created_utc: f64,
    #[serde(default)]
    is_self: bool,
}

impl LinkData {
    /// Convert to a discovered post; `None` for self posts.
    fn into_post(self) -> Result<Option<Post>, DiscoveryError> {
        let Some(url) = self.url.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        if self.is_self {
            return Ok(None);
        }
        let created = DateTime::from_timestamp(self.created_utc as i64, 0).ok_or_else(|| {
            DiscoveryError::Malformed(format!("bad created_utc {}", self.created_utc))
        })?;
        Ok(Some(Post::discovered(
            absolute(url),
            self.title,
            absolute(self.permalink),
            self.score,
            created,
        )))
    }
}

/// Site-relative links (permalinks, crosspost targets) made absolute.
fn absolute(link: String) -> String {
    if link.starts_with('/') {
        format!("{}{}", PUBLIC_BASE, link)
    } else {
        link
    }
}
