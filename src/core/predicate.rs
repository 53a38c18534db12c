//! Activation predicates and required-value checks over a configuration snapshot.

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigKey, ConfigSnapshot};
use crate::utils::validation;

type CheckFn = Arc<dyn Fn(&ConfigSnapshot) -> bool + Send + Sync>;
type ValidatorFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Boolean condition gating whether a target's action runs.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    check: CheckFn,
}

impl Predicate {
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ConfigSnapshot) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// True when the resolved version descriptor is on a release branch.
    ///
    /// False when no version descriptor was resolved.
    pub fn on_release_branch() -> Self {
        Self::new("on release branch", |config| {
            config.version().map(|v| v.release_branch).unwrap_or(false)
        })
    }

    pub fn has_value(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(format!("{} is set", key), move |config| {
            config.get(&key).is_some_and(validation::is_non_blank)
        })
    }

    pub fn and(self, other: Predicate) -> Self {
        let (left, right) = (self.check, other.check);
        Self {
            description: format!("{} and {}", self.description, other.description),
            check: Arc::new(move |config| left(config) && right(config)),
        }
    }

    pub fn evaluate(&self, config: &ConfigSnapshot) -> bool {
        (self.check)(config)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

/// A configuration key that must hold an acceptable value before a target runs.
#[derive(Clone)]
pub struct Requirement {
    key: ConfigKey,
    description: String,
    validator: ValidatorFn,
}

impl Requirement {
    /// Key must be present and non-blank.
    pub fn present(key: impl Into<String>) -> Self {
        Self::matching(ConfigKey::plain(key), "non-empty", validation::is_non_blank)
    }

    /// Secret key that must be present and non-blank.
    pub fn secret(key: impl Into<String>) -> Self {
        Self::matching(ConfigKey::secret(key), "non-empty secret", validation::is_non_blank)
    }

    pub fn matching<F>(key: ConfigKey, description: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            key,
            description: description.into(),
            validator: Arc::new(validator),
        }
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_satisfied(&self, config: &ConfigSnapshot) -> bool {
        config
            .get(&self.key.name)
            .map(|value| (self.validator)(value))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("key", &self.key.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{RepositoryState, VersionDescriptor};

    fn on(branch: &str) -> ConfigSnapshot {
        let branches = vec!["master".to_string()];
        let version = VersionDescriptor::derive(
            RepositoryState {
                branch: Some(branch.to_string()),
                sha: Some("abc1234".to_string()),
                version: Some("1.0.0".to_string()),
            },
            &branches,
        )
        .unwrap();
        ConfigSnapshot::new().with_version(version)
    }

    #[test]
    fn release_branch_matches_origin_prefix() {
        let predicate = Predicate::on_release_branch();
        assert!(predicate.evaluate(&on("master")));
        assert!(predicate.evaluate(&on("origin/master")));
        assert!(!predicate.evaluate(&on("develop")));
    }

    #[test]
    fn release_branch_is_false_without_version() {
        assert!(!Predicate::on_release_branch().evaluate(&ConfigSnapshot::new()));
    }

    #[test]
    fn combinators_compose() {
        let config = on("master").with_text("token", "x");
        let predicate = Predicate::on_release_branch().and(Predicate::has_value("token"));
        assert!(predicate.evaluate(&config));
        assert!(!predicate.evaluate(&on("develop").with_text("token", "x")));
        assert!(!predicate.evaluate(&on("master")));
        assert_eq!(predicate.description(), "on release branch and token is set");
    }

    #[test]
    fn requirement_rejects_blank_values() {
        let requirement = Requirement::secret("web_deploy_password");
        assert!(!requirement.is_satisfied(&ConfigSnapshot::new()));
        assert!(!requirement.is_satisfied(&ConfigSnapshot::new().with_secret("web_deploy_password", "  ")));
        assert!(requirement.is_satisfied(&ConfigSnapshot::new().with_secret("web_deploy_password", "pw")));
        assert!(requirement.key().secret);
    }

    #[test]
    fn custom_validator_is_applied() {
        let requirement = Requirement::matching(
            ConfigKey::plain("slack_webhook_url"),
            "https URL",
            |v| v.starts_with("https://"),
        );
        assert!(!requirement.is_satisfied(&ConfigSnapshot::new().with_text("slack_webhook_url", "http://x")));
        assert!(requirement.is_satisfied(&ConfigSnapshot::new().with_text("slack_webhook_url", "https://x")));
    }
}
