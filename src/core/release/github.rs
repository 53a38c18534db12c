use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::config::SecretString;
use crate::error::{Error, ErrorCode, Result};
use crate::http;

use super::{PublishedRelease, ReleasePublisher, ReleaseRequest};

pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    target_commitish: &'a str,
    name: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct CreatedRelease {
    id: u64,
    #[serde(default)]
    html_url: String,
}

/// Creates releases through the GitHub REST API.
pub struct GitHubPublisher {
    client: Client,
    token: SecretString,
    api_base: String,
}

impl GitHubPublisher {
    pub fn new(client: Client, token: SecretString) -> Self {
        Self::with_api_base(client, token, GITHUB_API)
    }

    pub fn with_api_base(client: Client, token: SecretString, api_base: &str) -> Self {
        Self {
            client,
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

impl ReleasePublisher for GitHubPublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases",
            self.api_base, request.repository.owner, request.repository.name
        );
        let payload = CreateRelease {
            tag_name: &request.tag,
            target_commitish: &request.commit,
            name: &request.tag,
            body: &request.notes,
        };

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.expose()))
            .header(ACCEPT, "application/vnd.github+json")
            .json(&payload)
            .send()
            .map_err(|e| http::request_error(ErrorCode::ReleasePublishFailed, &url, e))?;

        let (status, body) = http::read_response(response);
        if !(200..300).contains(&status) {
            return Err(Error::release_publish_failed(&url, status, body));
        }

        let created: CreatedRelease = serde_json::from_str(&body).map_err(|e| {
            Error::internal_json(e.to_string(), Some("parse release response".to_string()))
        })?;
        Ok(PublishedRelease {
            id: created.id,
            url: created.html_url,
            tag: request.tag.clone(),
        })
    }
}
