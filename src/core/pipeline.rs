//! The standard target graph: clean, test, publish, deploy, release.
//!
//! Targets only declare what they need; external collaborators (HTTP transport,
//! notification webhook, release host) come from a [`Services`] implementation so
//! the same graph runs against fakes in tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::changelog::{self, SectionSelector};
use crate::config::{ConfigKey, ConfigSnapshot, SecretString};
use crate::deploy::{
    DeployEndpoint, DeployPipeline, DeployRequest, DeployTransport, HttpTransport, ManifestStamp,
    Notifier, SlackNotifier, StagedCopy,
};
use crate::error::{Error, Result};
use crate::git;
use crate::http;
use crate::predicate::{Predicate, Requirement};
use crate::release::{self, GitHubPublisher, ReleasePublisher, ReleaseRequest, RepositoryCoordinates};
use crate::settings::PipelineSettings;
use crate::target::{ActionOutput, Target, TargetGraph};
use crate::utils::{command, io, pattern};

pub const DEFAULT_TARGET: &str = "clean";

pub const WEB_DEPLOY_USERNAME: &str = "web_deploy_username";
pub const WEB_DEPLOY_PASSWORD: &str = "web_deploy_password";
pub const APP_SERVICE_NAME: &str = "app_service_name";
pub const SLACK_WEBHOOK_URL: &str = "slack_webhook_url";
pub const DEPLOY_TIMEOUT_SECS: &str = "deploy_timeout_secs";
pub const GITHUB_TOKEN: &str = "github_token";
pub const REPOSITORY: &str = "repository";
pub const RELEASE_SECTION: &str = "release_section";

/// Factories for everything that talks to the network.
pub trait Services: Send + Sync {
    fn deploy_transport(&self, timeout: Option<Duration>) -> Result<Box<dyn DeployTransport>>;
    fn notifier(&self, webhook_url: SecretString) -> Result<Box<dyn Notifier>>;
    fn release_publisher(&self, token: SecretString) -> Result<Box<dyn ReleasePublisher>>;
}

/// Real endpoints over reqwest.
pub struct HttpServices;

impl Services for HttpServices {
    fn deploy_transport(&self, timeout: Option<Duration>) -> Result<Box<dyn DeployTransport>> {
        Ok(Box::new(HttpTransport::new(http::client(timeout)?)))
    }

    fn notifier(&self, webhook_url: SecretString) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(SlackNotifier::new(http::client(None)?, webhook_url)))
    }

    fn release_publisher(&self, token: SecretString) -> Result<Box<dyn ReleasePublisher>> {
        Ok(Box::new(GitHubPublisher::new(http::client(None)?, token)))
    }
}

struct Context {
    root: PathBuf,
    settings: PipelineSettings,
    services: Arc<dyn Services>,
}

/// Declare the standard targets for the repository at `root`.
pub fn standard_graph(
    root: &Path,
    settings: &PipelineSettings,
    services: Arc<dyn Services>,
) -> Result<TargetGraph> {
    let ctx = Arc::new(Context {
        root: root.to_path_buf(),
        settings: settings.clone(),
        services,
    });
    let mut graph = TargetGraph::new();

    graph.register(
        Target::new("clean")
            .describe("Remove build output and recreate the output directory")
            .executes(action(&ctx, clean)),
    )?;

    graph.register(
        Target::new("test")
            .describe("Install dependencies and run the CI test suite")
            .depends_on("clean")
            .executes(action(&ctx, test)),
    )?;

    graph.register(
        Target::new("publish")
            .describe("Build and publish the package (latest on release branches, next elsewhere)")
            .depends_on("clean")
            .executes(action(&ctx, publish)),
    )?;

    graph.register(
        Target::new("deploy")
            .describe("Zip-deploy the demo site and post a notification")
            .depends_on("clean")
            .requires(Requirement::secret(WEB_DEPLOY_USERNAME))
            .requires(Requirement::secret(WEB_DEPLOY_PASSWORD))
            .requires(Requirement::present(APP_SERVICE_NAME))
            .requires(Requirement::secret(SLACK_WEBHOOK_URL))
            .reads(ConfigKey::plain(DEPLOY_TIMEOUT_SECS))
            .executes(action(&ctx, deploy)),
    )?;

    graph.register(
        Target::new("release")
            .describe("Publish a tagged release with notes from the changelog")
            .requires(Requirement::secret(GITHUB_TOKEN))
            .reads(ConfigKey::plain(REPOSITORY))
            .reads(ConfigKey::plain(RELEASE_SECTION))
            .only_when(Predicate::on_release_branch())
            .executes(action(&ctx, release)),
    )?;

    Ok(graph)
}

fn action(
    ctx: &Arc<Context>,
    body: fn(&Context, &ConfigSnapshot) -> Result<ActionOutput>,
) -> impl Fn(&ConfigSnapshot) -> Result<ActionOutput> + Send + Sync + 'static {
    let ctx = Arc::clone(ctx);
    move |config| body(&ctx, config)
}

fn run_steps(ctx: &Context, target: &str, lines: &[String]) -> Result<()> {
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        log_status!("run", "{}: {}", target, line);
        let output = command::run_shell_in(&ctx.root, line)?;
        if !output.success {
            return Err(Error::target_action_failed(
                target,
                format!("'{}' exited with {}", line, output.exit_code),
            )
            .with_detail("output", json!(output)));
        }
    }
    Ok(())
}

fn relative(ctx: &Context, path: &Path) -> String {
    path.strip_prefix(&ctx.root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn clean(ctx: &Context, _: &ConfigSnapshot) -> Result<ActionOutput> {
    let mut removed = Vec::new();
    for path in pattern::expand_under(&ctx.root, &ctx.settings.clean)? {
        if io::remove_path(&path, "clean")? {
            removed.push(relative(ctx, &path));
        }
    }
    let output = ctx.settings.output_path(&ctx.root);
    io::ensure_clean_dir(&output, "clean")?;

    Ok(ActionOutput::with_data(json!({
        "removed": removed,
        "output": relative(ctx, &output),
    })))
}

fn test(ctx: &Context, _: &ConfigSnapshot) -> Result<ActionOutput> {
    let steps = [
        ctx.settings.install_command.clone(),
        ctx.settings.test_command.clone(),
    ];
    run_steps(ctx, "test", &steps)?;
    Ok(ActionOutput::empty())
}

fn publish(ctx: &Context, config: &ConfigSnapshot) -> Result<ActionOutput> {
    let version = config.require_version()?;
    run_steps(ctx, "publish", &ctx.settings.build_steps())?;

    let dist = ctx.settings.dist_path(&ctx.root);
    if !dist.is_dir() {
        return Err(Error::target_action_failed(
            "publish",
            format!("Build output {} does not exist", dist.display()),
        ));
    }

    let mut output = ActionOutput::empty();
    for file in &ctx.settings.package_files {
        let from = ctx.root.join(file);
        if from.is_file() {
            io::copy_file(&from, &dist.join(file), "copy package file")?;
        } else {
            output = output.warn(format!("{} not found; not packaged", file));
        }
    }

    let package_version = version.package_version();
    let dist_tag = if version.release_branch { "latest" } else { "next" };
    let pm = &ctx.settings.package_manager;
    command::run_in(
        &dist,
        pm,
        &["version", &package_version, "--no-git-tag-version", "--allow-same-version"],
        "stamp package version",
    )?;
    command::run_in(&dist, pm, &["publish", "--tag", dist_tag], "publish package")?;

    output.data = Some(json!({ "version": package_version, "tag": dist_tag }));
    Ok(output)
}

fn deploy_timeout(config: &ConfigSnapshot) -> Result<Option<Duration>> {
    match config.get(DEPLOY_TIMEOUT_SECS).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| {
                Error::config_invalid_value(
                    DEPLOY_TIMEOUT_SECS,
                    Some(raw.to_string()),
                    "Expected a positive number of seconds",
                )
            }),
    }
}

fn deploy(ctx: &Context, config: &ConfigSnapshot) -> Result<ActionOutput> {
    let version = config.require_version()?.package_version();
    let settings = &ctx.settings;
    let demo = settings.demo_path(&ctx.root);

    let request = DeployRequest {
        root: ctx.root.clone(),
        build: settings.build_steps(),
        staging: vec![StagedCopy {
            from: settings.dist_path(&ctx.root),
            to: demo.join(&settings.dist_dir),
        }],
        manifest: Some(ManifestStamp {
            file: demo.join(&settings.manifest),
            placeholder: settings.version_placeholder.clone(),
        }),
        source: demo,
        archive: settings.archive_path(&ctx.root),
        endpoint: DeployEndpoint::zip_deploy(
            config.require(APP_SERVICE_NAME)?,
            &settings.deploy_host,
            config.require(WEB_DEPLOY_USERNAME)?,
            SecretString::new(config.require(WEB_DEPLOY_PASSWORD)?),
        ),
        version,
        project: settings.display_name(&ctx.root),
        sender: settings.notification_sender.clone(),
    };

    let transport = ctx.services.deploy_transport(deploy_timeout(config)?)?;
    let notifier = ctx
        .services
        .notifier(SecretString::new(config.require(SLACK_WEBHOOK_URL)?))?;
    let report = DeployPipeline::new(transport.as_ref(), notifier.as_ref()).run(&request)?;

    let mut output = ActionOutput::with_data(json!(report));
    if let Some(err) = report.notification_error() {
        output = output.secondary_failure(&err.with_target("deploy"));
    }
    Ok(output)
}

fn repository(ctx: &Context, config: &ConfigSnapshot) -> Result<RepositoryCoordinates> {
    match config.get(REPOSITORY).filter(|v| !v.trim().is_empty()) {
        Some(value) => RepositoryCoordinates::parse(value),
        None => RepositoryCoordinates::parse(&git::remote_url(&ctx.root, &ctx.settings.remote)?),
    }
}

fn release(ctx: &Context, config: &ConfigSnapshot) -> Result<ActionOutput> {
    let version = config.require_version()?;
    let path = ctx.root.join(&ctx.settings.changelog);
    let content = changelog::read(&path)?;
    let selector = SectionSelector::from_label(config.get(RELEASE_SECTION));
    let notes = release::notes_from_changelog(&content, &selector, &version.release_tag())
        .map_err(|e| e.with_detail("path", json!(path.display().to_string())))?;

    let request = ReleaseRequest {
        tag: notes.tag.clone(),
        commit: version.sha.clone(),
        notes: notes.text.clone(),
        repository: repository(ctx, config)?,
    };
    log_status!("release", "Creating {} on {} at {}", request.tag, request.repository, version.short_sha());

    let publisher = ctx
        .services
        .release_publisher(SecretString::new(config.require(GITHUB_TOKEN)?))?;
    let published = publisher.publish(&request)?;

    let mut output = ActionOutput::with_data(json!({ "release": published, "notes": notes }));
    if notes.entries.is_empty() {
        output = output.warn(format!("Changelog section '{}' has no entries", notes.section));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl Services for Offline {
        fn deploy_transport(&self, _: Option<Duration>) -> Result<Box<dyn DeployTransport>> {
            Err(Error::internal_unexpected("offline"))
        }
        fn notifier(&self, _: SecretString) -> Result<Box<dyn Notifier>> {
            Err(Error::internal_unexpected("offline"))
        }
        fn release_publisher(&self, _: SecretString) -> Result<Box<dyn ReleasePublisher>> {
            Err(Error::internal_unexpected("offline"))
        }
    }

    fn graph() -> TargetGraph {
        standard_graph(Path::new("/tmp/repo"), &PipelineSettings::default(), Arc::new(Offline)).unwrap()
    }

    #[test]
    fn declares_standard_targets_in_order() {
        assert_eq!(
            graph().names(),
            vec!["clean", "test", "publish", "deploy", "release"]
        );
    }

    #[test]
    fn deploy_plan_runs_clean_first() {
        assert_eq!(graph().plan("deploy").unwrap().names(), vec!["clean", "deploy"]);
    }

    #[test]
    fn deploy_resolves_its_secrets() {
        let g = graph();
        let keys = g.plan("deploy").unwrap().config_keys();
        let secret: Vec<_> = keys.iter().filter(|k| k.secret).map(|k| k.name.as_str()).collect();
        assert_eq!(
            secret,
            vec![SLACK_WEBHOOK_URL, WEB_DEPLOY_PASSWORD, WEB_DEPLOY_USERNAME]
        );
        assert!(keys.contains(&ConfigKey::plain(DEPLOY_TIMEOUT_SECS)));
    }

    #[test]
    fn deploy_timeout_parsing() {
        assert_eq!(deploy_timeout(&ConfigSnapshot::new()).unwrap(), None);
        let config = ConfigSnapshot::new().with_text(DEPLOY_TIMEOUT_SECS, "90");
        assert_eq!(deploy_timeout(&config).unwrap(), Some(Duration::from_secs(90)));
        let config = ConfigSnapshot::new().with_text(DEPLOY_TIMEOUT_SECS, "soon");
        assert_eq!(
            deploy_timeout(&config).unwrap_err().code.as_str(),
            "config.invalid_value"
        );
    }
}
