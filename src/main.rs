use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{list, notes, plan, run, secret};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "liftoff")]
#[command(version = VERSION)]
#[command(about = "Run release pipeline targets in dependency order")]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a target and everything it depends on
    Run(run::RunArgs),
    /// Show what a run would do without executing anything
    Plan(plan::PlanArgs),
    /// List declared targets
    List(list::ListArgs),
    /// Print release notes assembled from the changelog
    Notes(notes::NotesArgs),
    /// Manage values stored in the system keychain
    Secret(secret::SecretArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        root: cli.root.unwrap_or_else(|| PathBuf::from(".")),
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
