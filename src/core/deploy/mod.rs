//! Zip-deploy pipeline: build, package, upload, notify.
//!
//! Stages advance strictly forward:
//! `Building -> Packaging -> Uploading -> AwaitingResponse -> Succeeded | Failed`.
//! A non-2xx answer is terminal and never retried. Notification runs only after
//! `Succeeded`, and its failure is reported next to the deployment, not instead of it.

mod notify;
mod package;
mod transport;

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::error::{Error, ErrorReport, Result};
use crate::utils::command;

pub use notify::{Attachment, Field, Notification, Notifier, SlackNotifier};
pub use package::{build_artifact, stage, stamp_version, Artifact, ManifestStamp};
pub use transport::{
    DeployEndpoint, DeployResponse, DeployTransport, HttpTransport, ARCHIVE_CONTENT_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Building,
    Packaging,
    Uploading,
    AwaitingResponse,
    Succeeded,
    Failed,
}

impl DeployStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStage::Building => "building",
            DeployStage::Packaging => "packaging",
            DeployStage::Uploading => "uploading",
            DeployStage::AwaitingResponse => "awaiting_response",
            DeployStage::Succeeded => "succeeded",
            DeployStage::Failed => "failed",
        }
    }
}

/// Copy a build output directory into the directory that gets archived.
#[derive(Debug, Clone)]
pub struct StagedCopy {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub root: PathBuf,
    /// Shell command lines run in `root` during `Building`, in order.
    pub build: Vec<String>,
    pub staging: Vec<StagedCopy>,
    pub manifest: Option<ManifestStamp>,
    /// Directory whose contents become the archive.
    pub source: PathBuf,
    pub archive: PathBuf,
    pub endpoint: DeployEndpoint,
    pub version: String,
    pub project: String,
    pub sender: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed { error: ErrorReport },
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub stage: DeployStage,
    pub stages: Vec<DeployStage>,
    pub url: String,
    pub version: String,
    pub artifact: Artifact,
    pub response: DeployResponse,
    /// RFC 3339, UTC.
    pub deployed_at: String,
    pub notification: NotificationStatus,
}

impl DeployReport {
    /// The notification error, when delivery failed.
    pub fn notification_error(&self) -> Option<Error> {
        match &self.notification {
            NotificationStatus::Sent => None,
            NotificationStatus::Failed { error } => Some(Error::notify_failed(
                error.message.clone(),
                json!({ "url": self.url, "cause": error.details }),
            )),
        }
    }
}

pub struct DeployPipeline<'a> {
    transport: &'a dyn DeployTransport,
    notifier: &'a dyn Notifier,
}

impl<'a> DeployPipeline<'a> {
    pub fn new(transport: &'a dyn DeployTransport, notifier: &'a dyn Notifier) -> Self {
        Self { transport, notifier }
    }

    pub fn run(&self, request: &DeployRequest) -> Result<DeployReport> {
        let mut stages = Vec::new();
        let fail = |stages: &[DeployStage], err: Error| -> Error {
            let reached = stages.last().copied().unwrap_or(DeployStage::Building);
            err.with_detail("stage", json!(reached.as_str()))
                .with_detail("stages", json!(stages))
        };

        stages.push(DeployStage::Building);
        if let Err(err) = self.build(request) {
            return Err(fail(&stages, err));
        }

        stages.push(DeployStage::Packaging);
        let artifact = match self.package(request) {
            Ok(artifact) => artifact,
            Err(err) => return Err(fail(&stages, err)),
        };

        stages.push(DeployStage::Uploading);
        log_status!(
            "deploy",
            "Uploading {} ({} bytes) to {}",
            artifact.path,
            artifact.bytes,
            request.endpoint.url
        );
        let response = match self.transport.upload(&request.endpoint, &request.archive) {
            Ok(response) => response,
            Err(err) => return Err(fail(&stages, err)),
        };

        stages.push(DeployStage::AwaitingResponse);
        if !response.is_success() {
            stages.push(DeployStage::Failed);
            log_status!("deploy", "Endpoint answered {}", response.status);
            let err = Error::deploy_upload_failed(&request.endpoint.url, response.status, &response.body);
            return Err(fail(&stages, err));
        }

        stages.push(DeployStage::Succeeded);
        let deployed_at = Utc::now().to_rfc3339();
        log_status!("deploy", "Deployed {} ({})", request.project, request.version);

        let message = Notification::deployed(&request.sender, &request.project, &request.version);
        let notification = match self.notifier.send(&message) {
            Ok(()) => NotificationStatus::Sent,
            Err(err) => {
                log_status!("deploy", "Notification failed: {}", err.message);
                NotificationStatus::Failed {
                    error: ErrorReport::from(&err),
                }
            }
        };

        Ok(DeployReport {
            stage: DeployStage::Succeeded,
            stages,
            url: request.endpoint.url.clone(),
            version: request.version.clone(),
            artifact,
            response,
            deployed_at,
            notification,
        })
    }

    fn build(&self, request: &DeployRequest) -> Result<()> {
        for line in &request.build {
            log_status!("deploy", "Building: {}", line);
            let output = command::run_shell_in(&request.root, line)?;
            if !output.success {
                let detail = if output.stderr.is_empty() {
                    output.stdout
                } else {
                    output.stderr
                };
                return Err(Error::deploy_build_failed(line, detail));
            }
        }
        Ok(())
    }

    fn package(&self, request: &DeployRequest) -> Result<Artifact> {
        for copy in &request.staging {
            stage(&copy.from, &copy.to)?;
        }
        if let Some(manifest) = &request.manifest {
            if stamp_version(manifest, &request.version)? == 0 {
                log_status!(
                    "deploy",
                    "No '{}' placeholder in {}",
                    manifest.placeholder,
                    manifest.file.display()
                );
            }
        }
        build_artifact(&request.source, &request.archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Refusing;

    impl DeployTransport for Refusing {
        fn upload(&self, _: &DeployEndpoint, _: &Path) -> Result<DeployResponse> {
            Err(Error::internal_unexpected("connection refused"))
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Notification>>);

    impl Notifier for Recorder {
        fn send(&self, notification: &Notification) -> Result<()> {
            self.0.borrow_mut().push(notification.clone());
            Ok(())
        }
    }

    fn request(root: &Path) -> DeployRequest {
        DeployRequest {
            root: root.to_path_buf(),
            build: vec!["exit 3".to_string()],
            staging: Vec::new(),
            manifest: None,
            source: root.join("demo"),
            archive: root.join("output/deployment.zip"),
            endpoint: DeployEndpoint::zip_deploy("app", "example.net", "user", SecretString::new("pw")),
            version: "1.0.0".to_string(),
            project: "demo".to_string(),
            sender: "CI Build".to_string(),
        }
    }

    #[test]
    fn failing_build_stops_before_packaging() {
        let dir = TempDir::new().unwrap();
        let notifier = Recorder::default();
        let pipeline = DeployPipeline::new(&Refusing, &notifier);

        let err = pipeline.run(&request(dir.path())).unwrap_err();
        assert_eq!(err.code.as_str(), "deploy.build_failed");
        assert_eq!(err.details["stage"], "building");
        assert!(!dir.path().join("output/deployment.zip").exists());
    }

    #[test]
    fn transport_error_is_surfaced_without_notification() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("demo")).unwrap();
        fs::write(dir.path().join("demo/index.html"), "x").unwrap();
        let mut req = request(dir.path());
        req.build.clear();

        let notifier = Recorder::default();
        let err = DeployPipeline::new(&Refusing, &notifier).run(&req).unwrap_err();
        assert_eq!(err.details["stage"], "uploading");
        assert!(notifier.0.borrow().is_empty());
    }
}
