use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use liftoff::pipeline::HttpServices;
use liftoff::session::Session;

pub type CmdResult<T> = liftoff::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub root: PathBuf,
}

impl GlobalArgs {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn open_session(&self) -> liftoff::Result<Session> {
        Session::open(&self.root, Arc::new(HttpServices))
    }
}

/// Parse trailing `--key value` / `--key=value` pairs into configuration overrides.
///
/// Dashes in keys become underscores, so `--app-service-name x` sets `app_service_name`.
pub(crate) fn parse_overrides(extra: &[String]) -> liftoff::Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    let mut iter = extra.iter();

    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(liftoff::Error::validation_invalid_argument(
                "overrides",
                format!("Expected --key value, got '{}'", arg),
                None,
                None,
            ));
        };

        let (key, value) = match flag.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None => {
                let value = iter.next().ok_or_else(|| {
                    liftoff::Error::validation_invalid_argument(
                        flag,
                        format!("Missing value for flag --{}", flag),
                        None,
                        None,
                    )
                })?;
                (flag, value.clone())
            }
        };
        values.insert(key.replace('-', "_"), value);
    }

    Ok(values)
}

pub mod list;
pub mod notes;
pub mod plan;
pub mod run;
pub mod secret;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (liftoff::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::List(args) => dispatch!(args, global, list),
        crate::Commands::Notes(args) => dispatch!(args, global, notes),
        crate::Commands::Secret(args) => dispatch!(args, global, secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overrides_accept_both_forms() {
        let values = parse_overrides(&args(&["--app-service-name", "calc", "--deploy_timeout_secs=30"])).unwrap();
        assert_eq!(values["app_service_name"], "calc");
        assert_eq!(values["deploy_timeout_secs"], "30");
    }

    #[test]
    fn overrides_reject_dangling_flag() {
        let err = parse_overrides(&args(&["--github_token"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn overrides_reject_bare_values() {
        assert!(parse_overrides(&args(&["calc"])).is_err());
    }
}
