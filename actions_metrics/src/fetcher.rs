//! Job log retrieval.
//!
//! GitHub does not serve job logs directly: the logs endpoint answers with a
//! redirect to a short-lived signed URL. [`LogSource`] resolves that URL and
//! [`LogFetcher`] downloads it, feeding the body to [`LogParser`] one line at
//! a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::redirect::Policy;
use url::Url;

use crate::error::{LogError, Result};
use crate::event::JobIdentity;
use crate::parser::{LogParser, ParseResult};

const USER_AGENT: &str = concat!("actions-metrics/", env!("CARGO_PKG_VERSION"));

/// Resolves where a job's log can be downloaded from.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn log_location(&self, job: &JobIdentity) -> Result<Url>;
}

/// [`LogSource`] backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubLogSource {
    client: reqwest::Client,
    api_base: Url,
    token: Option<String>,
}

impl GitHubLogSource {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(LogError::InvalidBaseUrl(api_base.to_string()));
        }

        // The redirect target is what we want, so never follow it here.
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn logs_url(&self, job: &JobIdentity) -> Url {
        let job_id = job.job_id.to_string();
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "repos",
                job.owner.as_str(),
                job.repo.as_str(),
                "actions",
                "jobs",
                job_id.as_str(),
                "logs",
            ]);
        }
        url
    }
}

#[async_trait]
impl LogSource for GitHubLogSource {
    async fn log_location(&self, job: &JobIdentity) -> Result<Url> {
        let url = self.logs_url(job);
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_redirection() {
            return Err(LogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(LogError::MissingLocation)?;
        Ok(Url::parse(location)?)
    }
}

/// Downloads a job log and parses it without holding the whole body.
#[derive(Clone)]
pub struct LogFetcher {
    source: Arc<dyn LogSource>,
    http: reqwest::Client,
}

impl LogFetcher {
    pub fn new(source: Arc<dyn LogSource>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { source, http })
    }

    pub async fn fetch_and_parse(&self, job: &JobIdentity) -> Result<ParseResult> {
        let location = self.source.log_location(job).await?;
        // reqwest errors quote the request URL, signature included
        let mut response = self
            .http
            .get(location.clone())
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogError::Status {
                status: status.as_u16(),
                url: redacted(&location),
            });
        }

        let mut parser = LogParser::new();
        let mut lines = LineBuffer::default();
        while let Some(chunk) = response.chunk().await.map_err(reqwest::Error::without_url)? {
            lines.push(&chunk, |line| parser.feed_line(line));
        }
        lines.finish(|line| parser.feed_line(line));

        Ok(parser.finish())
    }
}

/// Signed download URLs carry credentials in the query string.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Reassembles lines from arbitrarily split body chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8], mut on_line: impl FnMut(&str)) {
        self.pending.extend_from_slice(chunk);
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            on_line(&String::from_utf8_lossy(&self.pending[start..end]));
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
    }

    fn finish(self, mut on_line: impl FnMut(&str)) {
        if !self.pending.is_empty() {
            on_line(&String::from_utf8_lossy(&self.pending));
        }
    }
}
