use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::config::{ConfigKey, ConfigSnapshot};
use crate::error::{Error, Result};
use crate::target::{Target, TargetGraph};

/// Ordered targets a run will visit: dependencies first, ties broken by declaration order.
#[derive(Debug)]
pub struct ExecutionPlan<'g> {
    requested: String,
    targets: Vec<&'g Target>,
}

impl<'g> ExecutionPlan<'g> {
    pub fn requested(&self) -> &str {
        &self.requested
    }

    pub fn targets(&self) -> &[&'g Target] {
        &self.targets
    }

    pub fn names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Every key the planned targets require or read. A key declared secret
    /// anywhere is resolved as secret.
    pub fn config_keys(&self) -> Vec<ConfigKey> {
        let mut keys: BTreeMap<String, bool> = BTreeMap::new();
        for target in &self.targets {
            for key in target.config_keys() {
                let secret = keys.entry(key.name.clone()).or_insert(false);
                *secret |= key.secret;
            }
        }
        keys.into_iter()
            .map(|(name, secret)| ConfigKey { name, secret })
            .collect()
    }

    /// Static preview of what a run would do with `config`, without executing anything.
    pub fn preview(&self, config: &ConfigSnapshot) -> Vec<PlannedTarget> {
        self.targets
            .iter()
            .map(|target| {
                let missing: Vec<String> = target
                    .requirements()
                    .iter()
                    .filter(|r| !r.is_satisfied(config))
                    .map(|r| r.key().name.clone())
                    .collect();
                let status = if !missing.is_empty() {
                    PlannedTargetStatus::Missing
                } else if !target.is_active(config) {
                    PlannedTargetStatus::Inactive
                } else {
                    PlannedTargetStatus::Ready
                };
                PlannedTarget {
                    name: target.name().to_string(),
                    depends_on: target.dependencies().to_vec(),
                    status,
                    missing,
                    condition: target.condition().map(|p| p.description().to_string()),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedTarget {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub status: PlannedTargetStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedTargetStatus {
    Ready,
    Missing,
    Inactive,
}

pub(crate) fn plan<'g>(graph: &'g TargetGraph, requested: &str) -> Result<ExecutionPlan<'g>> {
    let root = graph
        .position(requested)
        .ok_or_else(|| Error::target_not_found(requested, None, graph.names()))?;

    let closure = dependency_closure(graph, root)?;
    let ordered = order_closure(graph, &closure)?;

    Ok(ExecutionPlan {
        requested: requested.to_string(),
        targets: ordered.into_iter().map(|idx| &graph.targets()[idx]).collect(),
    })
}

/// Indices reachable from `root` through dependency edges, `root` included.
fn dependency_closure(graph: &TargetGraph, root: usize) -> Result<BTreeSet<usize>> {
    let targets = graph.targets();
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];

    while let Some(idx) = stack.pop() {
        if !seen.insert(idx) {
            continue;
        }
        let target = &targets[idx];
        for dep in target.dependencies() {
            let dep_idx = graph.position(dep).ok_or_else(|| {
                Error::target_not_found(dep, Some(target.name().to_string()), graph.names())
            })?;
            if !seen.contains(&dep_idx) {
                stack.push(dep_idx);
            }
        }
    }

    Ok(seen)
}

/// Kahn's algorithm over the closure. The ready set is ordered by declaration
/// index, so unconstrained targets keep declaration order.
fn order_closure(graph: &TargetGraph, closure: &BTreeSet<usize>) -> Result<Vec<usize>> {
    let targets = graph.targets();
    let mut indegree: BTreeMap<usize, usize> = closure.iter().map(|&idx| (idx, 0)).collect();
    let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for &idx in closure {
        let mut counted = HashSet::new();
        for dep in targets[idx].dependencies() {
            // Closure construction already rejected unknown names.
            let Some(dep_idx) = graph.position(dep) else {
                continue;
            };
            if counted.insert(dep_idx) {
                *indegree.entry(idx).or_insert(0) += 1;
                dependents.entry(dep_idx).or_default().push(idx);
            }
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&idx, _)| idx)
        .collect();

    let mut ordered = Vec::with_capacity(closure.len());
    while let Some(idx) = ready.pop_first() {
        ordered.push(idx);
        for &child in dependents.get(&idx).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = indegree.get_mut(&child) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if ordered.len() != closure.len() {
        let pending: Vec<String> = indegree
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&idx, _)| targets[idx].name().to_string())
            .collect();
        return Err(Error::target_cyclic_dependency(pending));
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Predicate, Requirement};

    fn graph(decls: &[(&str, &[&str])]) -> TargetGraph {
        let mut graph = TargetGraph::new();
        for (name, deps) in decls {
            let mut target = Target::new(*name);
            for dep in *deps {
                target = target.depends_on(*dep);
            }
            graph.register(target).unwrap();
        }
        graph
    }

    #[test]
    fn plan_includes_only_reachable_targets() {
        let g = graph(&[("clean", &[]), ("test", &["clean"]), ("deploy", &["clean"])]);
        assert_eq!(g.plan("deploy").unwrap().names(), vec!["clean", "deploy"]);
    }

    #[test]
    fn diamond_visits_shared_dependency_once() {
        let g = graph(&[
            ("clean", &[]),
            ("build", &["clean"]),
            ("test", &["clean"]),
            ("ship", &["test", "build"]),
        ]);
        assert_eq!(
            g.plan("ship").unwrap().names(),
            vec!["clean", "build", "test", "ship"]
        );
    }

    #[test]
    fn unconstrained_targets_keep_declaration_order() {
        let g = graph(&[
            ("c", &[]),
            ("a", &[]),
            ("b", &[]),
            ("all", &["b", "a", "c"]),
        ]);
        assert_eq!(g.plan("all").unwrap().names(), vec!["c", "a", "b", "all"]);
    }

    #[test]
    fn dependency_declared_later_still_runs_first() {
        let g = graph(&[("ship", &["late"]), ("late", &[])]);
        assert_eq!(g.plan("ship").unwrap().names(), vec!["late", "ship"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let g = graph(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"]), ("d", &["a"])]);
        let err = g.plan("d").unwrap_err();
        assert_eq!(err.code.as_str(), "target.cyclic_dependency");
        assert_eq!(err.details["pending"], serde_json::json!(["a", "b", "c", "d"]));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&[("loop", &["loop"])]);
        assert_eq!(
            g.plan("loop").unwrap_err().code.as_str(),
            "target.cyclic_dependency"
        );
    }

    #[test]
    fn unknown_dependency_names_parent() {
        let g = graph(&[("deploy", &["build"])]);
        let err = g.plan("deploy").unwrap_err();
        assert_eq!(err.code.as_str(), "target.not_found");
        assert_eq!(err.details["requiredBy"], "deploy");
    }

    #[test]
    fn unknown_requested_target() {
        let g = graph(&[("clean", &[])]);
        let err = g.plan("nope").unwrap_err();
        assert_eq!(err.code.as_str(), "target.not_found");
        assert_eq!(err.details["available"], serde_json::json!(["clean"]));
    }

    #[test]
    fn config_keys_merge_secret_flags() {
        let mut g = TargetGraph::new();
        g.register(Target::new("a").reads(ConfigKey::plain("token"))).unwrap();
        g.register(
            Target::new("b")
                .depends_on("a")
                .requires(Requirement::secret("token"))
                .requires(Requirement::present("app")),
        )
        .unwrap();

        let keys = g.plan("b").unwrap().config_keys();
        assert_eq!(keys, vec![ConfigKey::plain("app"), ConfigKey::secret("token")]);
    }

    #[test]
    fn preview_classifies_without_running() {
        let mut g = TargetGraph::new();
        g.register(Target::new("clean").executes(|_| panic!("must not run"))).unwrap();
        g.register(
            Target::new("deploy")
                .depends_on("clean")
                .requires(Requirement::secret("password")),
        )
        .unwrap();
        g.register(
            Target::new("release")
                .depends_on("deploy")
                .only_when(Predicate::on_release_branch()),
        )
        .unwrap();

        let preview = g.plan("release").unwrap().preview(&ConfigSnapshot::new());
        let statuses: Vec<_> = preview.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                PlannedTargetStatus::Ready,
                PlannedTargetStatus::Missing,
                PlannedTargetStatus::Inactive
            ]
        );
        assert_eq!(preview[1].missing, vec!["password"]);
    }
}
