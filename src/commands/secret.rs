use clap::{Args, Subcommand};
use serde::Serialize;

use liftoff::keychain;
use liftoff::settings;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct SecretArgs {
    /// Keychain scope (defaults to the project's secret_scope)
    #[arg(long)]
    pub scope: Option<String>,

    #[command(subcommand)]
    pub command: SecretCommand,
}

#[derive(Subcommand)]
pub enum SecretCommand {
    /// Store a value
    Set {
        key: String,
        /// Value to store (prompted for when omitted)
        value: Option<String>,
    },
    /// Check whether a value is stored
    Get {
        key: String,
        /// Print the stored value
        #[arg(long)]
        reveal: bool,
    },
    /// Remove a stored value
    Delete { key: String },
}

#[derive(Serialize)]
pub struct SecretOutput {
    pub action: &'static str,
    pub scope: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub fn run(args: SecretArgs, global: &GlobalArgs) -> CmdResult<SecretOutput> {
    let scope = match args.scope {
        Some(scope) => scope,
        None => settings::load(global.root())?.pipeline.secret_scope,
    };

    let output = match args.command {
        SecretCommand::Set { key, value } => {
            let value = match value {
                Some(value) => value,
                None => crate::tty::prompt_secret(&format!("Value for {}: ", key))?,
            };
            if value.trim().is_empty() {
                return Err(liftoff::Error::validation_invalid_argument(
                    "value",
                    "Refusing to store an empty value",
                    Some(key),
                    None,
                ));
            }
            keychain::store(&scope, &key, &value)?;
            SecretOutput { action: "set", scope, key, present: Some(true), value: None }
        }
        SecretCommand::Get { key, reveal } => {
            let stored = keychain::get(&scope, &key)?;
            SecretOutput {
                action: "get",
                present: Some(stored.is_some()),
                value: stored.filter(|_| reveal),
                scope,
                key,
            }
        }
        SecretCommand::Delete { key } => {
            keychain::delete(&scope, &key)?;
            SecretOutput { action: "delete", scope, key, present: Some(false), value: None }
        }
    };

    Ok((output, 0))
}
