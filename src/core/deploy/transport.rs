use std::fs::File;
use std::path::Path;

use reqwest::blocking::{Body, Client};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use crate::config::SecretString;
use crate::error::{Error, ErrorCode, Result};
use crate::http;

pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Where and as whom an archive is pushed.
#[derive(Debug, Clone)]
pub struct DeployEndpoint {
    pub url: String,
    pub username: String,
    pub password: SecretString,
}

impl DeployEndpoint {
    /// Zip-deploy endpoint of an app service: `https://{app}.{host}/api/zipdeploy`.
    pub fn zip_deploy(
        app_service_name: &str,
        deploy_host: &str,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            url: format!(
                "https://{}.{}/api/zipdeploy",
                app_service_name,
                deploy_host.trim_start_matches('.')
            ),
            username: username.into(),
            password,
        }
    }

    pub fn authorization(&self) -> String {
        http::basic_auth_header(&self.username, self.password.expose())
    }
}

/// Status line and body of the deployment endpoint's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResponse {
    pub status: u16,
    pub body: String,
}

impl DeployResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait DeployTransport {
    /// One POST of the archive. Returns whatever status the endpoint answered with;
    /// only failures to talk to the endpoint at all are errors.
    fn upload(&self, endpoint: &DeployEndpoint, archive: &Path) -> Result<DeployResponse>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DeployTransport for HttpTransport {
    fn upload(&self, endpoint: &DeployEndpoint, archive: &Path) -> Result<DeployResponse> {
        let file = File::open(archive).map_err(|e| {
            Error::internal_io(
                format!("{}: {}", archive.display(), e),
                Some("open archive for upload".to_string()),
            )
        })?;
        let length = file.metadata().map(|m| m.len()).unwrap_or(0);

        let response = self
            .client
            .post(&endpoint.url)
            .header(AUTHORIZATION, endpoint.authorization())
            .header(CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .body(Body::sized(file, length))
            .send()
            .map_err(|e| http::request_error(ErrorCode::DeployUploadFailed, &endpoint.url, e))?;

        let (status, body) = http::read_response(response);
        Ok(DeployResponse { status, body })
    }
}
