#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liftoff::config::{ConfigSnapshot, SecretString};
use liftoff::deploy::{DeployEndpoint, DeployResponse, DeployTransport, Notification, Notifier};
use liftoff::pipeline::Services;
use liftoff::release::{PublishedRelease, ReleasePublisher, ReleaseRequest};
use liftoff::settings::PipelineSettings;
use liftoff::version::{RepositoryState, VersionDescriptor};
use liftoff::{Error, Result};

/// Everything the fakes saw, shared with the test body.
#[derive(Default)]
pub struct Recorded {
    pub uploads: Vec<(String, String, u64)>,
    pub notifications: Vec<Notification>,
    pub releases: Vec<ReleaseRequest>,
    pub timeouts: Vec<Option<Duration>>,
}

#[derive(Clone)]
pub struct FakeServices {
    pub status: u16,
    pub body: String,
    pub notify_fails: bool,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeServices {
    pub fn answering(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            notify_fails: false,
            recorded: Arc::default(),
        }
    }

    pub fn with_broken_notifications(mut self) -> Self {
        self.notify_fails = true;
        self
    }
}

struct FakeTransport(FakeServices);

impl DeployTransport for FakeTransport {
    fn upload(&self, endpoint: &DeployEndpoint, archive: &Path) -> Result<DeployResponse> {
        let size = fs::metadata(archive).map(|m| m.len()).unwrap_or(0);
        self.0.recorded.lock().unwrap().uploads.push((
            endpoint.url.clone(),
            endpoint.authorization(),
            size,
        ));
        Ok(DeployResponse {
            status: self.0.status,
            body: self.0.body.clone(),
        })
    }
}

struct FakeNotifier(FakeServices);

impl Notifier for FakeNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        if self.0.notify_fails {
            return Err(Error::notify_failed(
                "Notification webhook returned status 404",
                serde_json::json!({ "status": 404, "body": "no_service" }),
            ));
        }
        self.0
            .recorded
            .lock()
            .unwrap()
            .notifications
            .push(notification.clone());
        Ok(())
    }
}

struct FakePublisher(FakeServices);

impl ReleasePublisher for FakePublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease> {
        self.0.recorded.lock().unwrap().releases.push(request.clone());
        Ok(PublishedRelease {
            id: 1,
            tag: request.tag.clone(),
            url: String::new(),
        })
    }
}

impl Services for FakeServices {
    fn deploy_transport(&self, timeout: Option<Duration>) -> Result<Box<dyn DeployTransport>> {
        self.recorded.lock().unwrap().timeouts.push(timeout);
        Ok(Box::new(FakeTransport(self.clone())))
    }

    fn notifier(&self, _: SecretString) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(FakeNotifier(self.clone())))
    }

    fn release_publisher(&self, _: SecretString) -> Result<Box<dyn ReleasePublisher>> {
        Ok(Box::new(FakePublisher(self.clone())))
    }
}

pub fn version(branch: &str) -> VersionDescriptor {
    VersionDescriptor::derive(
        RepositoryState {
            branch: Some(branch.to_string()),
            sha: Some("4f2c9a17d3e8b6c5a4f2c9a17d3e8b6c5a4f2c9a".to_string()),
            version: Some("v1.2.0".to_string()),
        },
        &["master".to_string()],
    )
    .unwrap()
}

/// Settings whose only shell step writes the build output inside the repository.
pub fn offline_settings() -> PipelineSettings {
    PipelineSettings {
        install_command: String::new(),
        build_command: "mkdir -p dist && printf 'export const add = 1;' > dist/calculator.js"
            .to_string(),
        test_command: String::new(),
        release_branches: vec!["master".to_string()],
        package_name: "calculator".to_string(),
        ..PipelineSettings::default()
    }
}

/// A repository with a demo site carrying the version placeholder.
pub fn seed_repository(root: &Path) {
    fs::create_dir_all(root.join("demo")).unwrap();
    fs::write(
        root.join("demo/index.html"),
        "<footer>Version @@APP_VERSION@@</footer>",
    )
    .unwrap();
    fs::write(
        root.join("CHANGELOG.md"),
        "# Changelog\n\n## 1.2.0\n- fix A\n- fix B\n## 1.1.0\n- old\n",
    )
    .unwrap();
}

pub fn deploy_config(branch: &str) -> ConfigSnapshot {
    ConfigSnapshot::new()
        .with_secret("web_deploy_username", "$calculator")
        .with_secret("web_deploy_password", "hunter2")
        .with_text("app_service_name", "calculator-demo")
        .with_secret("slack_webhook_url", "https://hooks.example.com/T000")
        .with_version(version(branch))
}
