use clap::Args;

use liftoff::engine::RunReport;
use liftoff::pipeline::DEFAULT_TARGET;

use super::{parse_overrides, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Target to run (defaults to clean)
    pub target: Option<String>,

    /// Value overrides: `-- --key value`. Take precedence over every other source.
    #[arg(last = true, allow_hyphen_values = true)]
    pub overrides: Vec<String>,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunReport> {
    let overrides = parse_overrides(&args.overrides)?;
    let session = global.open_session()?;
    let target = args.target.as_deref().unwrap_or(DEFAULT_TARGET);

    let report = session.run(target, &session.resolver(overrides))?;
    Ok((report, 0))
}
