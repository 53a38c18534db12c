//! Target declarations and the graph they are registered in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigKey, ConfigSnapshot};
use crate::engine::executor::{self, RunReport};
use crate::engine::planner::{self, ExecutionPlan};
use crate::error::{Error, ErrorReport, Result};
use crate::predicate::{Predicate, Requirement};

type ActionFn = Arc<dyn Fn(&ConfigSnapshot) -> Result<ActionOutput> + Send + Sync>;

/// What a successful action hands back to the executor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Failures that did not fail the target itself (e.g. a broken notification channel).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_failures: Vec<ErrorReport>,
}

impl ActionOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn warn(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn secondary_failure(mut self, err: &Error) -> Self {
        self.secondary_failures.push(ErrorReport::from(err));
        self
    }
}

/// A named unit of work with dependencies, required values and an optional gate.
#[derive(Clone)]
pub struct Target {
    name: String,
    description: Option<String>,
    depends_on: Vec<String>,
    requires: Vec<Requirement>,
    reads: Vec<ConfigKey>,
    only_when: Option<Predicate>,
    action: ActionFn,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            depends_on: Vec::new(),
            requires: Vec::new(),
            reads: Vec::new(),
            only_when: None,
            action: Arc::new(|_| Ok(ActionOutput::empty())),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn depends_on(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        if !self.depends_on.contains(&target) {
            self.depends_on.push(target);
        }
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    /// Optional value the action reads; resolved but never enforced.
    pub fn reads(mut self, key: ConfigKey) -> Self {
        self.reads.push(key);
        self
    }

    pub fn only_when(mut self, predicate: Predicate) -> Self {
        self.only_when = Some(match self.only_when.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn executes<F>(mut self, action: F) -> Self
    where
        F: Fn(&ConfigSnapshot) -> Result<ActionOutput> + Send + Sync + 'static,
    {
        self.action = Arc::new(action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requires
    }

    /// Required keys followed by optional ones.
    pub fn config_keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.requires.iter().map(|r| r.key()).chain(self.reads.iter())
    }

    pub fn condition(&self) -> Option<&Predicate> {
        self.only_when.as_ref()
    }

    /// Activation predicate result; targets without one are always active.
    pub fn is_active(&self, config: &ConfigSnapshot) -> bool {
        self.only_when
            .as_ref()
            .map(|p| p.evaluate(config))
            .unwrap_or(true)
    }

    /// First requirement the snapshot does not satisfy.
    pub fn unmet_requirement(&self, config: &ConfigSnapshot) -> Option<&Requirement> {
        self.requires.iter().find(|r| !r.is_satisfied(config))
    }

    pub(crate) fn invoke(&self, config: &ConfigSnapshot) -> Result<ActionOutput> {
        (self.action)(config)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("requires", &self.requires)
            .field("only_when", &self.only_when)
            .finish()
    }
}

/// Serializable description of a declared target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl From<&Target> for TargetInfo {
    fn from(target: &Target) -> Self {
        Self {
            name: target.name.clone(),
            description: target.description.clone(),
            depends_on: target.depends_on.clone(),
            requires: target.requires.iter().map(|r| r.key().name.clone()).collect(),
            condition: target.only_when.as_ref().map(|p| p.description().to_string()),
        }
    }
}

/// Targets in declaration order.
#[derive(Debug, Default)]
pub struct TargetGraph {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl TargetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Target) -> Result<()> {
        if self.index.contains_key(target.name()) {
            return Err(Error::target_duplicate(target.name()));
        }
        self.index.insert(target.name.clone(), self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&idx| &self.targets[idx])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn describe(&self) -> Vec<TargetInfo> {
        self.targets.iter().map(TargetInfo::from).collect()
    }

    /// Transitive closure of `requested` in execution order.
    pub fn plan(&self, requested: &str) -> Result<ExecutionPlan<'_>> {
        planner::plan(self, requested)
    }

    /// Plan and execute `requested` against `config`.
    pub fn run(&self, requested: &str, config: &ConfigSnapshot) -> Result<RunReport> {
        let plan = self.plan(requested)?;
        executor::execute(&plan, config)
    }
}
