//! Sequential target execution.
//!
//! For each planned target, in order:
//! 1. every requirement must hold, otherwise the run aborts with `target.requirement_not_met`
//! 2. a false activation predicate marks the target skipped (dependents still run)
//! 3. the action runs; an error marks it failed and aborts the run
//!
//! `execute` runs against a ready snapshot. `execute_resolving` grows the
//! snapshot one target at a time, so value sources are only asked for the keys
//! of targets the run actually reaches.
//!
//! Errors leaving either function always carry the target name, and their details
//! include the results recorded up to and including the failing target.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigResolver, ConfigSnapshot};
use crate::error::{Error, ErrorReport, Result};

use super::planner::ExecutionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Skipped,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub name: String,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_failures: Vec<ErrorReport>,
}

impl TargetResult {
    fn new(name: &str, status: TargetStatus, started: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            reason: None,
            duration_ms: started.elapsed().as_millis() as u64,
            data: None,
            warnings: Vec::new(),
            secondary_failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Every target finished but at least one reported a secondary failure.
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub requested: String,
    pub status: RunStatus,
    pub targets: Vec<TargetResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn result(&self, name: &str) -> Option<&TargetResult> {
        self.targets.iter().find(|r| r.name == name)
    }

    /// `(name, status)` pairs in execution order.
    pub fn outcomes(&self) -> Vec<(String, TargetStatus)> {
        self.targets
            .iter()
            .map(|r| (r.name.clone(), r.status))
            .collect()
    }
}

pub fn execute(plan: &ExecutionPlan<'_>, config: &ConfigSnapshot) -> Result<RunReport> {
    run_targets(plan, config.clone(), None)
}

/// Execute `plan`, resolving each target's keys into `base` right before it runs.
pub fn execute_resolving(
    plan: &ExecutionPlan<'_>,
    resolver: &ConfigResolver,
    base: ConfigSnapshot,
) -> Result<RunReport> {
    run_targets(plan, base, Some(resolver))
}

fn run_targets(
    plan: &ExecutionPlan<'_>,
    mut config: ConfigSnapshot,
    resolver: Option<&ConfigResolver>,
) -> Result<RunReport> {
    let mut results: Vec<TargetResult> = Vec::with_capacity(plan.targets().len());

    for target in plan.targets() {
        let started = Instant::now();

        if let Some(resolver) = resolver {
            config = resolver
                .resolve_into(config, target.config_keys().cloned())
                .map_err(|e| with_results(e.with_target(target.name()), &results))?;
        }
        let config = &config;

        if let Some(requirement) = target.unmet_requirement(config) {
            log_status!("run", "{} blocked: '{}' is missing", target.name(), requirement.key().name);
            let mut failed = TargetResult::new(target.name(), TargetStatus::Failed, started);
            failed.reason = Some(format!("required value '{}' is missing", requirement.key().name));
            results.push(failed);

            let err = Error::target_requirement_not_met(
                target.name(),
                &requirement.key().name,
                requirement.description(),
            );
            return Err(with_results(err, &results));
        }

        if !target.is_active(config) {
            let condition = target
                .condition()
                .map(|p| p.description().to_string())
                .unwrap_or_default();
            log_status!("run", "{} skipped ({} is false)", target.name(), condition);
            let mut skipped = TargetResult::new(target.name(), TargetStatus::Skipped, started);
            skipped.reason = Some(format!("condition not met: {}", condition));
            results.push(skipped);
            continue;
        }

        log_status!("run", "running {}", target.name());
        match target.invoke(config) {
            Ok(output) => {
                let mut succeeded = TargetResult::new(target.name(), TargetStatus::Succeeded, started);
                succeeded.data = output.data;
                succeeded.warnings = output.warnings;
                succeeded.secondary_failures = output.secondary_failures;
                for failure in &succeeded.secondary_failures {
                    log_status!("run", "{}: {}", target.name(), failure.message);
                }
                results.push(succeeded);
            }
            Err(err) => {
                log_status!("run", "{} failed: {}", target.name(), err.message);
                let mut failed = TargetResult::new(target.name(), TargetStatus::Failed, started);
                failed.reason = Some(err.message.clone());
                results.push(failed);
                return Err(with_results(err.with_target(target.name()), &results));
            }
        }
    }

    Ok(build_report(plan.requested(), results))
}

fn with_results(err: Error, results: &[TargetResult]) -> Error {
    let value = serde_json::to_value(results).unwrap_or(Value::Null);
    err.with_detail("results", value)
}

fn build_report(requested: &str, results: Vec<TargetResult>) -> RunReport {
    let succeeded = results
        .iter()
        .filter(|r| r.status == TargetStatus::Succeeded)
        .count();
    let skipped = results
        .iter()
        .filter(|r| r.status == TargetStatus::Skipped)
        .count();
    let degraded = results.iter().any(|r| !r.secondary_failures.is_empty());

    let (status, next_actions) = if degraded {
        (
            RunStatus::PartialSuccess,
            vec!["Check the reported secondary failures; the targets themselves completed".to_string()],
        )
    } else {
        (RunStatus::Success, Vec::new())
    };

    RunReport {
        requested: requested.to_string(),
        status,
        summary: RunSummary {
            total: results.len(),
            succeeded,
            skipped,
            next_actions,
        },
        targets: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigKey, ValueSource};
    use crate::predicate::{Predicate, Requirement};
    use crate::target::{ActionOutput, Target, TargetGraph};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &str, log: &Log) -> Target {
        let log = Arc::clone(log);
        let label = name.to_string();
        Target::new(name).executes(move |_| {
            log.lock().unwrap().push(label.clone());
            Ok(ActionOutput::empty())
        })
    }

    #[test]
    fn failed_action_stops_the_run_with_target_attached() {
        let log: Log = Arc::default();
        let mut graph = TargetGraph::new();
        graph.register(recording("clean", &log)).unwrap();
        graph
            .register(
                Target::new("build")
                    .depends_on("clean")
                    .executes(|_| Err(Error::internal_unexpected("compiler crashed"))),
            )
            .unwrap();
        graph.register(recording("ship", &log).depends_on("build")).unwrap();

        let err = graph.run("ship", &ConfigSnapshot::new()).unwrap_err();
        assert_eq!(err.target.as_deref(), Some("build"));
        assert_eq!(*log.lock().unwrap(), vec!["clean"]);

        let results = err.details["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["status"], "failed");
    }

    #[test]
    fn secondary_failure_marks_run_partial() {
        let mut graph = TargetGraph::new();
        graph
            .register(Target::new("deploy").executes(|_| {
                Ok(ActionOutput::empty().secondary_failure(&Error::notify_failed(
                    "webhook down",
                    Value::Null,
                )))
            }))
            .unwrap();

        let report = graph.run("deploy", &ConfigSnapshot::new()).unwrap();
        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.targets[0].status, TargetStatus::Succeeded);
        assert_eq!(report.targets[0].secondary_failures[0].code, "notify.failed");
        assert!(!report.summary.next_actions.is_empty());
    }

    #[test]
    fn requirement_checked_before_activation() {
        let mut graph = TargetGraph::new();
        graph
            .register(
                Target::new("release")
                    .requires(Requirement::secret("github_token"))
                    .only_when(Predicate::new("never", |_| false)),
            )
            .unwrap();

        let err = graph.run("release", &ConfigSnapshot::new()).unwrap_err();
        assert_eq!(err.code.as_str(), "target.requirement_not_met");
    }

    #[test]
    fn action_output_is_recorded() {
        let mut graph = TargetGraph::new();
        graph
            .register(Target::new("notes").executes(|_| {
                Ok(ActionOutput::with_data(serde_json::json!({ "tag": "v1.0.0" })).warn("empty section"))
            }))
            .unwrap();

        let report = graph.run("notes", &ConfigSnapshot::new()).unwrap();
        let result = report.result("notes").unwrap();
        assert_eq!(result.data.as_ref().unwrap()["tag"], "v1.0.0");
        assert_eq!(result.warnings, vec!["empty section"]);
        assert_eq!(report.status, RunStatus::Success);
    }

    /// Source that answers every key and records which keys it was asked for.
    struct Vault {
        asked: Log,
    }

    impl ValueSource for Vault {
        fn name(&self) -> &'static str {
            "vault"
        }

        fn lookup(&self, key: &ConfigKey) -> Result<Option<String>> {
            self.asked.lock().unwrap().push(key.name.clone());
            Ok(Some(format!("{}-value", key.name)))
        }
    }

    fn vault_graph(build_fails: bool) -> TargetGraph {
        let mut graph = TargetGraph::new();
        graph
            .register(
                Target::new("build")
                    .requires(Requirement::present("app_service_name"))
                    .executes(move |_| {
                        if build_fails {
                            Err(Error::internal_unexpected("compiler crashed"))
                        } else {
                            Ok(ActionOutput::empty())
                        }
                    }),
            )
            .unwrap();
        graph
            .register(
                Target::new("release")
                    .depends_on("build")
                    .requires(Requirement::secret("github_token"))
                    .executes(|config| {
                        assert_eq!(config.get("app_service_name"), Some("app_service_name-value"));
                        Ok(ActionOutput::empty())
                    }),
            )
            .unwrap();
        graph
    }

    #[test]
    fn values_resolved_only_for_reached_targets() {
        let asked: Log = Arc::default();
        let resolver = ConfigResolver::new().with_source(Vault { asked: Arc::clone(&asked) });
        let graph = vault_graph(true);
        let plan = graph.plan("release").unwrap();

        let err = execute_resolving(&plan, &resolver, ConfigSnapshot::new()).unwrap_err();
        assert_eq!(err.target.as_deref(), Some("build"));
        assert_eq!(*asked.lock().unwrap(), vec!["app_service_name"]);
    }

    #[test]
    fn resolved_values_carry_over_to_later_targets() {
        let asked: Log = Arc::default();
        let resolver = ConfigResolver::new().with_source(Vault { asked: Arc::clone(&asked) });
        let graph = vault_graph(false);
        let plan = graph.plan("release").unwrap();

        let report = execute_resolving(&plan, &resolver, ConfigSnapshot::new()).unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(*asked.lock().unwrap(), vec!["app_service_name", "github_token"]);
    }
}
