//! Polling client for `/faces`.
//!
//! Display clients poll rather than subscribe. The client remembers the last
//! `ETag` and sends it as `If-None-Match`, so an unchanged snapshot costs a
//! bodiless 304.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::snapshot::Snapshot;

#[derive(Debug)]
pub enum FacesPoll {
    Updated(Snapshot),
    NotModified,
}

pub struct FacesClient {
    url: String,
    agent: ureq::Agent,
    etag: Option<String>,
}

impl FacesClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(5))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            etag: None,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn poll(&mut self) -> Result<FacesPoll> {
        let mut request = self.agent.get(&self.url);
        if let Some(tag) = &self.etag {
            request = request.set("If-None-Match", tag);
        }
        let response = request
            .call()
            .with_context(|| format!("GET {} failed", self.url))?;

        match response.status() {
            304 => Ok(FacesPoll::NotModified),
            200 => {
                let tag = response.header("ETag").map(str::to_string);
                let body = response
                    .into_string()
                    .context("failed to read snapshot body")?;
                let snapshot: Snapshot =
                    serde_json::from_str(&body).context("invalid snapshot JSON")?;
                self.etag = tag;
                Ok(FacesPoll::Updated(snapshot))
            }
            status => Err(anyhow!("unexpected status {} from {}", status, self.url)),
        }
    }
}
