//! Layered value resolution into an immutable configuration snapshot.
//!
//! Sources are consulted in priority order and the first non-empty value wins.
//! Resolution only asks for the keys the planned targets declare, so a run of
//! `clean` never touches the keychain. Missing values are not an error here:
//! the executor reports them when a target that requires them is about to run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::keychain;
use crate::version::VersionDescriptor;

/// Environment variable prefix tried before the bare upper-snake name.
pub const ENV_PREFIX: &str = "LIFTOFF_";

/// Upper-snake environment name for a key: `web_deploy_username` -> `WEB_DEPLOY_USERNAME`.
pub fn env_var_name(key: &str) -> String {
    key.replace(['-', '.'], "_").to_uppercase()
}

/// A key a run needs, and whether its value must be treated as secret.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey {
    pub name: String,
    pub secret: bool,
}

impl ConfigKey {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: false,
        }
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: true,
        }
    }
}

/// String whose content never appears in `Debug` or serialized output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Text(String),
    Secret(SecretString),
    Version(VersionDescriptor),
}

#[derive(Debug, Clone)]
pub struct ResolvedValue {
    pub value: ConfigValue,
    pub source: &'static str,
}

impl Serialize for ResolvedValue {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(2))?;
        map.serialize_entry("source", self.source)?;
        match &self.value {
            ConfigValue::Text(text) => map.serialize_entry("value", text)?,
            ConfigValue::Secret(_) => map.serialize_entry("value", "***")?,
            ConfigValue::Version(v) => map.serialize_entry("value", v)?,
        }
        map.end()
    }
}

/// Reserved key holding the run's version descriptor.
pub const VERSION_KEY: &str = "version";

/// Immutable view of every value a run may read.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, ResolvedValue>,
}

impl ConfigSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(
            key.into(),
            ResolvedValue {
                value: ConfigValue::Text(value.into()),
                source: "explicit",
            },
        );
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(
            key.into(),
            ResolvedValue {
                value: ConfigValue::Secret(SecretString::new(value)),
                source: "explicit",
            },
        );
        self
    }

    pub fn with_version(mut self, version: VersionDescriptor) -> Self {
        self.values.insert(
            VERSION_KEY.to_string(),
            ResolvedValue {
                value: ConfigValue::Version(version),
                source: "repository",
            },
        );
        self
    }

    /// String value of a key; secrets are exposed, the version descriptor is not a string.
    pub fn get(&self, key: &str) -> Option<&str> {
        match &self.values.get(key)?.value {
            ConfigValue::Text(text) => Some(text.as_str()),
            ConfigValue::Secret(secret) => Some(secret.expose()),
            ConfigValue::Version(_) => None,
        }
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::config_missing_key(key, None))
    }

    pub fn resolved(&self, key: &str) -> Option<&ResolvedValue> {
        self.values.get(key)
    }

    pub fn version(&self) -> Option<&VersionDescriptor> {
        match &self.values.get(VERSION_KEY)?.value {
            ConfigValue::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn require_version(&self) -> Result<&VersionDescriptor> {
        self.version()
            .ok_or_else(|| Error::config_missing_key(VERSION_KEY, None))
    }
}

/// A place values can come from.
pub trait ValueSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup(&self, key: &ConfigKey) -> Result<Option<String>>;
}

/// `--key value` pairs from the command line.
#[derive(Debug, Default)]
pub struct FlagSource {
    values: HashMap<String, String>,
}

impl FlagSource {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl ValueSource for FlagSource {
    fn name(&self) -> &'static str {
        "flag"
    }

    fn lookup(&self, key: &ConfigKey) -> Result<Option<String>> {
        Ok(self.values.get(&key.name).cloned())
    }
}

/// Process environment: `LIFTOFF_<KEY>` first, then `<KEY>`.
#[derive(Debug, Default)]
pub struct EnvSource {
    overrides: Option<HashMap<String, String>>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self { overrides: None }
    }

    /// Fixed variable table instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self {
            overrides: Some(vars),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.overrides {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}

impl ValueSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, key: &ConfigKey) -> Result<Option<String>> {
        let bare = env_var_name(&key.name);
        let prefixed = format!("{}{}", ENV_PREFIX, bare);
        Ok(self
            .var(&prefixed)
            .filter(|v| !v.is_empty())
            .or_else(|| self.var(&bare)))
    }
}

/// OS keychain. Only secret keys are looked up.
#[derive(Debug)]
pub struct KeychainSource {
    scope: String,
}

impl KeychainSource {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl ValueSource for KeychainSource {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn lookup(&self, key: &ConfigKey) -> Result<Option<String>> {
        if !key.secret {
            return Ok(None);
        }
        match keychain::get(&self.scope, &key.name) {
            Ok(value) => Ok(value),
            Err(err) => {
                // No secret service on this host counts as absent.
                log_status!("config", "Keychain lookup for '{}' skipped: {}", key.name, err.message);
                Ok(None)
            }
        }
    }
}

/// `[params]` defaults from the project file.
#[derive(Debug, Default)]
pub struct DefaultsSource {
    values: BTreeMap<String, String>,
}

impl DefaultsSource {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl ValueSource for DefaultsSource {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn lookup(&self, key: &ConfigKey) -> Result<Option<String>> {
        Ok(self.values.get(&key.name).cloned())
    }
}

/// Ordered list of sources, highest priority first.
#[derive(Default)]
pub struct ConfigResolver {
    sources: Vec<Box<dyn ValueSource>>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl ValueSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// First non-empty value for one key, with the source it came from.
    pub fn lookup(&self, key: &ConfigKey) -> Result<Option<(String, &'static str)>> {
        for source in &self.sources {
            if let Some(value) = source.lookup(key)? {
                if !value.trim().is_empty() {
                    return Ok(Some((value, source.name())));
                }
            }
        }
        Ok(None)
    }

    /// Resolve the given keys into a snapshot. Absent keys are simply left out.
    pub fn resolve<I>(&self, keys: I) -> Result<ConfigSnapshot>
    where
        I: IntoIterator<Item = ConfigKey>,
    {
        self.resolve_into(ConfigSnapshot::new(), keys)
    }

    /// Add `keys` to `base`. Keys already present keep their value and are not looked up again.
    pub fn resolve_into<I>(&self, base: ConfigSnapshot, keys: I) -> Result<ConfigSnapshot>
    where
        I: IntoIterator<Item = ConfigKey>,
    {
        let mut values = base.values;
        for key in keys {
            if let Some(existing) = values.get_mut(&key.name) {
                if let (true, ConfigValue::Text(text)) = (key.secret, &existing.value) {
                    existing.value = ConfigValue::Secret(SecretString::new(text.clone()));
                }
                continue;
            }
            if key.name == VERSION_KEY {
                continue;
            }
            if let Some((raw, source)) = self.lookup(&key)? {
                let value = if key.secret {
                    ConfigValue::Secret(SecretString::new(raw))
                } else {
                    ConfigValue::Text(raw)
                };
                values.insert(key.name.clone(), ResolvedValue { value, source });
            }
        }
        Ok(ConfigSnapshot { values })
    }
}
