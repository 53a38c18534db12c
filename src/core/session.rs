//! One run's view of a repository: settings, version and value resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{
    ConfigKey, ConfigResolver, ConfigSnapshot, DefaultsSource, EnvSource, FlagSource,
    KeychainSource, VERSION_KEY,
};
use crate::engine::{ExecutionPlan, PlannedTarget, RunReport};
use crate::error::{Error, Result};
use crate::git;
use crate::pipeline::{self, Services, APP_SERVICE_NAME};
use crate::settings::{self, ProjectFile};
use crate::target::TargetGraph;
use crate::version::{RepositoryState, VersionDescriptor};

/// Values that override what git reports.
pub const BRANCH_KEY: &str = "branch";
pub const COMMIT_KEY: &str = "commit_sha";

pub struct Session {
    root: PathBuf,
    project: ProjectFile,
    repository: RepositoryState,
    graph: TargetGraph,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanPreview {
    pub requested: String,
    pub version: VersionDescriptor,
    pub targets: Vec<PlannedTarget>,
    pub config: ConfigSnapshot,
}

impl Session {
    /// Load `liftoff.toml`, read repository state from git and declare the standard graph.
    pub fn open(root: &Path, services: Arc<dyn Services>) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::validation_invalid_argument(
                "root",
                format!("{} is not a directory", root.display()),
                None,
                None,
            ));
        }
        let project = settings::load(root)?;
        let graph = pipeline::standard_graph(root, &project.pipeline, services)?;

        Ok(Self {
            root: root.to_path_buf(),
            project,
            repository: git::repository_state(root),
            graph,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project(&self) -> &ProjectFile {
        &self.project
    }

    /// Version descriptor from git, with `branch`, `commit_sha` and `version` overrides applied.
    pub fn version(&self, resolver: &ConfigResolver) -> Result<VersionDescriptor> {
        let mut state = self.repository.clone();
        let lookup = |key: &str| -> Result<Option<String>> {
            Ok(resolver.lookup(&ConfigKey::plain(key))?.map(|(value, _)| value))
        };
        if let Some(branch) = lookup(BRANCH_KEY)? {
            state.branch = Some(branch);
        }
        if let Some(sha) = lookup(COMMIT_KEY)? {
            state.sha = Some(sha);
        }
        if let Some(version) = lookup(VERSION_KEY)? {
            state.version = Some(version);
        }
        VersionDescriptor::derive(state, &self.project.pipeline.release_branches)
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    /// Flags, then environment, then keychain, then `[params]` defaults.
    pub fn resolver(&self, flags: HashMap<String, String>) -> ConfigResolver {
        let mut defaults = self.project.params.clone();
        if let Some(app) = &self.project.pipeline.default_app_service_name {
            defaults
                .entry(APP_SERVICE_NAME.to_string())
                .or_insert_with(|| app.clone());
        }

        ConfigResolver::new()
            .with_source(FlagSource::new(flags))
            .with_source(EnvSource::new())
            .with_source(KeychainSource::new(&self.project.pipeline.secret_scope))
            .with_source(DefaultsSource::new(defaults))
    }

    /// Resolve every key `plan` declares up front, plus the version descriptor. Used for previews.
    pub fn snapshot(&self, plan: &ExecutionPlan<'_>, resolver: &ConfigResolver) -> Result<ConfigSnapshot> {
        let version = self.version(resolver)?;
        Ok(resolver.resolve(plan.config_keys())?.with_version(version))
    }

    pub fn preview(&self, requested: &str, resolver: &ConfigResolver) -> Result<PlanPreview> {
        let plan = self.graph.plan(requested)?;
        let config = self.snapshot(&plan, resolver)?;
        Ok(PlanPreview {
            requested: requested.to_string(),
            version: config.require_version()?.clone(),
            targets: plan.preview(&config),
            config,
        })
    }

    /// Plan and execute `requested`. Each target's values are resolved only when it is reached.
    pub fn run(&self, requested: &str, resolver: &ConfigResolver) -> Result<RunReport> {
        let plan = self.graph.plan(requested)?;
        let version = self.version(resolver)?;
        log_status!(
            "run",
            "{} on {} ({})",
            plan.names().join(" -> "),
            version.branch,
            version.package_version()
        );
        let base = ConfigSnapshot::new().with_version(version);
        crate::engine::execute_resolving(&plan, resolver, base)
    }
}
