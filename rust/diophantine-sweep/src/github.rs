//! GitHub contents API as a [`RemoteStore`].
//!
//! `GET /repos/{owner}/{repo}/contents/{path}` yields the blob sha used as the
//! revision token; `PUT` on the same URL creates or (with `sha`) updates.

use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

use crate::publish::{PublishError, RemoteFile, RemoteStore, RepoTarget};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("diophantine-sweep/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

pub struct GitHubStore {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl GitHubStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Point at a different API root (GitHub Enterprise).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build();
        GitHubStore {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn contents_url(&self, target: &RepoTarget) -> String {
        contents_url(&self.api_base, target)
    }

    fn put(
        &self,
        target: &RepoTarget,
        content: &[u8],
        message: &str,
        revision: Option<&str>,
    ) -> Result<(), PublishError> {
        let body = put_body(content, message, revision);
        log::debug!("PUT {} ({} bytes)", self.contents_url(target), content.len());
        self.request("PUT", target)
            .send_json(body)
            .map_err(map_error)?;
        Ok(())
    }

    fn request(&self, method: &str, target: &RepoTarget) -> ureq::Request {
        self.agent
            .request(method, &self.contents_url(target))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
            .set("User-Agent", USER_AGENT)
    }
}

impl RemoteStore for GitHubStore {
    fn get_file(&self, target: &RepoTarget) -> Result<Option<RemoteFile>, PublishError> {
        log::debug!("GET {}", self.contents_url(target));
        match self.request("GET", target).call() {
            Ok(resp) => {
                let parsed: ContentsResponse = resp
                    .into_json()
                    .map_err(|e| PublishError::Malformed(e.to_string()))?;
                Ok(Some(RemoteFile {
                    revision: parsed.sha,
                }))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(map_error(e)),
        }
    }

    fn create_file(
        &self,
        target: &RepoTarget,
        content: &[u8],
        message: &str,
    ) -> Result<(), PublishError> {
        self.put(target, content, message, None)
    }

    fn update_file(
        &self,
        target: &RepoTarget,
        content: &[u8],
        message: &str,
        revision: &str,
    ) -> Result<(), PublishError> {
        self.put(target, content, message, Some(revision))
    }
}

fn contents_url(api_base: &str, target: &RepoTarget) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        api_base, target.owner, target.repo, target.path
    )
}

/// Request body for a contents `PUT`; `sha` is only sent when updating.
fn put_body(content: &[u8], message: &str, revision: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "message": message,
        "content": base64::engine::general_purpose::STANDARD.encode(content),
    });
    if let Some(sha) = revision {
        body["sha"] = serde_json::Value::String(sha.to_string());
    }
    body
}

fn map_error(err: ureq::Error) -> PublishError {
    match err {
        ureq::Error::Status(status, resp) => PublishError::Status {
            status,
            body: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => PublishError::Transport(t.to_string()),
    }
}
