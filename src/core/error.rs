use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidToml,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    TargetDuplicate,
    TargetNotFound,
    TargetCyclicDependency,
    TargetRequirementNotMet,
    TargetActionFailed,

    DeployBuildFailed,
    DeployPackagingFailed,
    DeployUploadFailed,
    NotifyFailed,

    ChangelogSectionNotFound,
    ReleasePublishFailed,

    GitCommandFailed,
    KeychainUnavailable,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidToml => "config.invalid_toml",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::TargetDuplicate => "target.duplicate",
            ErrorCode::TargetNotFound => "target.not_found",
            ErrorCode::TargetCyclicDependency => "target.cyclic_dependency",
            ErrorCode::TargetRequirementNotMet => "target.requirement_not_met",
            ErrorCode::TargetActionFailed => "target.action_failed",

            ErrorCode::DeployBuildFailed => "deploy.build_failed",
            ErrorCode::DeployPackagingFailed => "deploy.packaging_failed",
            ErrorCode::DeployUploadFailed => "deploy.upload_failed",
            ErrorCode::NotifyFailed => "notify.failed",

            ErrorCode::ChangelogSectionNotFound => "changelog.section_not_found",
            ErrorCode::ReleasePublishFailed => "release.publish_failed",

            ErrorCode::GitCommandFailed => "git.command_failed",
            ErrorCode::KeychainUnavailable => "keychain.unavailable",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetNotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_by: Option<String>,
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclicDependencyDetails {
    pub pending: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementNotMetDetails {
    pub key: String,
    pub requirement: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResponseDetails {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
    pub target: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "[{}] {}", target, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
            target: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn target_duplicate(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::TargetDuplicate,
            format!("Target '{}' is already registered", name),
            serde_json::json!({ "id": name }),
        )
    }

    pub fn target_not_found(
        name: impl Into<String>,
        required_by: Option<String>,
        available: Vec<String>,
    ) -> Self {
        let name = name.into();
        let message = match &required_by {
            Some(parent) => format!("Target '{}' depends on unknown target '{}'", parent, name),
            None => format!("Target '{}' not found", name),
        };
        Self::new(
            ErrorCode::TargetNotFound,
            message,
            to_details(TargetNotFoundDetails {
                id: name,
                required_by,
                available,
            }),
        )
        .with_hint("Run 'liftoff list' to see declared targets")
    }

    pub fn target_cyclic_dependency(pending: Vec<String>) -> Self {
        Self::new(
            ErrorCode::TargetCyclicDependency,
            format!("Targets contain a dependency cycle: {}", pending.join(", ")),
            to_details(CyclicDependencyDetails { pending }),
        )
    }

    pub fn target_requirement_not_met(
        target: impl Into<String>,
        key: impl Into<String>,
        requirement: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let hint = format!(
            "Provide it with '-- --{} <value>', the {} environment variable, or 'liftoff secret set {}'",
            key,
            crate::config::env_var_name(&key),
            key
        );
        Self::new(
            ErrorCode::TargetRequirementNotMet,
            format!("Required value '{}' is missing", key),
            to_details(RequirementNotMetDetails {
                key,
                requirement: requirement.into(),
            }),
        )
        .with_target(target)
        .with_hint(hint)
    }

    pub fn target_action_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::TargetActionFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
        .with_target(target)
    }

    pub fn deploy_build_failed(command: impl Into<String>, output: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::DeployBuildFailed,
            format!("Build step '{}' failed", command),
            serde_json::json!({ "command": command, "output": output.into() }),
        )
    }

    pub fn deploy_packaging_failed(path: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::DeployPackagingFailed,
            problem.clone(),
            serde_json::json!({ "path": path.into(), "problem": problem }),
        )
    }

    pub fn deploy_upload_failed(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            ErrorCode::DeployUploadFailed,
            format!("Deployment returned status {}: {}", status, body.trim()),
            to_details(RemoteResponseDetails {
                url: url.into(),
                status,
                body,
            }),
        )
    }

    pub fn notify_failed(message: impl Into<String>, details: Value) -> Self {
        Self::new(ErrorCode::NotifyFailed, message, details)
            .with_hint("The deployment itself completed; check the notification webhook")
    }

    pub fn changelog_section_not_found(section: impl Into<String>, path: Option<String>) -> Self {
        let section = section.into();
        Self::new(
            ErrorCode::ChangelogSectionNotFound,
            format!("No changelog section found for '{}'", section),
            serde_json::json!({ "section": section, "path": path }),
        )
        .with_hint("Changelog sections start with a '## <version>' header line")
    }

    pub fn release_publish_failed(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            ErrorCode::ReleasePublishFailed,
            format!("Release creation returned status {}: {}", status, body.trim()),
            to_details(RemoteResponseDetails {
                url: url.into(),
                status,
                body,
            }),
        )
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn keychain_unavailable(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::KeychainUnavailable,
            format!("Keychain error: {}", error.into()),
            Value::Null,
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            to_details(ConfigMissingKeyDetails {
                key: key.into(),
                path,
            }),
        )
    }

    pub fn config_invalid_toml(path: impl Into<String>, err: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidToml,
            format!("Invalid TOML in {}", path),
            serde_json::json!({ "path": path, "error": err.into() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            problem.clone(),
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("IO error ({}): {}", ctx, error),
            None => format!("IO error: {}", error),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    /// Attach the originating target. An already-attached target is kept.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        if self.target.is_none() {
            self.target = Some(target.into());
        }
        self
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Merge an extra field into `details`, wrapping non-object details.
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        match &mut self.details {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
            }
            other => {
                let mut map = serde_json::Map::new();
                if !other.is_null() {
                    map.insert("cause".to_string(), other.take());
                }
                map.insert(key.to_string(), value);
                self.details = Value::Object(map);
            }
        }
        self
    }
}

/// Serializable snapshot of an [`Error`], for failures reported inside
/// an otherwise successful result.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
            target: err.target.clone(),
        }
    }
}
