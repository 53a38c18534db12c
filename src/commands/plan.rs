use clap::Args;

use liftoff::pipeline::DEFAULT_TARGET;
use liftoff::session::PlanPreview;

use super::{parse_overrides, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct PlanArgs {
    /// Target to plan (defaults to clean)
    pub target: Option<String>,

    /// Value overrides, as for `run`
    #[arg(last = true, allow_hyphen_values = true)]
    pub overrides: Vec<String>,
}

pub fn run(args: PlanArgs, global: &GlobalArgs) -> CmdResult<PlanPreview> {
    let overrides = parse_overrides(&args.overrides)?;
    let session = global.open_session()?;
    let target = args.target.as_deref().unwrap_or(DEFAULT_TARGET);

    Ok((session.preview(target, &session.resolver(overrides))?, 0))
}
