//! Project file (`liftoff.toml`) with pipeline settings and parameter defaults.
//!
//! ```toml
//! [pipeline]
//! release_branches = ["master", "main"]
//! changelog = "CHANGELOG.md"
//!
//! [params]
//! app_service_name = "calculator-demo"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::io;

pub const PROJECT_FILE: &str = "liftoff.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFile {
    pub pipeline: PipelineSettings,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub release_branches: Vec<String>,
    pub output_dir: String,
    pub dist_dir: String,
    pub demo_dir: String,
    pub changelog: String,
    /// File inside the demo directory that carries the version placeholder.
    pub manifest: String,
    pub version_placeholder: String,
    pub clean: Vec<String>,
    /// Files copied next to the build output before publishing.
    pub package_files: Vec<String>,
    pub package_manager: String,
    /// Shell command lines run in the repository root. Empty means skip.
    pub install_command: String,
    pub build_command: String,
    pub test_command: String,
    pub deploy_host: String,
    pub default_app_service_name: Option<String>,
    pub archive_name: String,
    pub notification_sender: String,
    pub package_name: String,
    /// Git remote used to derive release coordinates.
    pub remote: String,
    /// Keychain scope for secrets.
    pub secret_scope: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            release_branches: vec!["master".to_string(), "main".to_string()],
            output_dir: "output".to_string(),
            dist_dir: "dist".to_string(),
            demo_dir: "demo".to_string(),
            changelog: "CHANGELOG.md".to_string(),
            manifest: "index.html".to_string(),
            version_placeholder: "@@APP_VERSION@@".to_string(),
            clean: vec![
                "dist".to_string(),
                "demo/dist".to_string(),
                "coverage".to_string(),
                "karma-results.xml".to_string(),
            ],
            package_files: vec![
                "README.md".to_string(),
                "LICENSE.md".to_string(),
                "CHANGELOG.md".to_string(),
                "package.json".to_string(),
            ],
            package_manager: "npm".to_string(),
            install_command: "npm install".to_string(),
            build_command: "npm run build".to_string(),
            test_command: "npm run test:ci".to_string(),
            deploy_host: "scm.azurewebsites.net".to_string(),
            default_app_service_name: None,
            archive_name: "deployment.zip".to_string(),
            notification_sender: "CI Build".to_string(),
            package_name: String::new(),
            remote: "origin".to_string(),
            secret_scope: "default".to_string(),
        }
    }
}

impl PipelineSettings {
    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    pub fn archive_path(&self, root: &Path) -> PathBuf {
        self.output_path(root).join(&self.archive_name)
    }

    pub fn dist_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dist_dir)
    }

    pub fn demo_path(&self, root: &Path) -> PathBuf {
        root.join(&self.demo_dir)
    }

    /// Install followed by build, skipping blank commands.
    pub fn build_steps(&self) -> Vec<String> {
        [&self.install_command, &self.build_command]
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Package name shown in notifications; falls back to the root directory name.
    pub fn display_name(&self, root: &Path) -> String {
        if !self.package_name.trim().is_empty() {
            return self.package_name.clone();
        }
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }
}

/// Load `liftoff.toml` from `root`. A missing file yields defaults.
pub fn load(root: &Path) -> Result<ProjectFile> {
    let path = root.join(PROJECT_FILE);
    if !path.exists() {
        return Ok(ProjectFile::default());
    }
    let raw = io::read_file(&path, "read project file")?;
    parse(&raw, &path)
}

pub fn parse(raw: &str, path: &Path) -> Result<ProjectFile> {
    let file: ProjectFile = toml::from_str(raw)
        .map_err(|e| Error::config_invalid_toml(path.display().to_string(), e.to_string()))?;

    if file.pipeline.release_branches.is_empty() {
        return Err(Error::config_invalid_value(
            "pipeline.release_branches",
            None,
            "At least one release branch is required",
        ));
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let file = load(dir.path()).unwrap();
        assert_eq!(file.pipeline.release_branches, vec!["master", "main"]);
        assert_eq!(file.pipeline.deploy_host, "scm.azurewebsites.net");
        assert_eq!(file.pipeline.build_steps(), vec!["npm install", "npm run build"]);
        assert!(file.params.is_empty());
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let raw = r#"
[pipeline]
release_branches = ["release"]
package_name = "antlr-calculator"

[params]
app_service_name = "calculator-demo"
"#;
        let file = parse(raw, Path::new("liftoff.toml")).unwrap();
        assert_eq!(file.pipeline.release_branches, vec!["release"]);
        assert_eq!(file.pipeline.changelog, "CHANGELOG.md");
        assert_eq!(file.params["app_service_name"], "calculator-demo");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = parse("[pipeline\n", Path::new("liftoff.toml")).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_toml");
    }

    #[test]
    fn empty_release_branches_rejected() {
        let err = parse("[pipeline]\nrelease_branches = []\n", Path::new("liftoff.toml")).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn blank_commands_are_skipped() {
        let raw = "[pipeline]\ninstall_command = \"\"\nbuild_command = \"make\"\n";
        let file = parse(raw, Path::new("liftoff.toml")).unwrap();
        assert_eq!(file.pipeline.build_steps(), vec!["make"]);
    }

    #[test]
    fn display_name_falls_back_to_directory() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.display_name(Path::new("/work/antlr-calculator")), "antlr-calculator");
    }
}
