use clap::Args;
use serde::Serialize;

use liftoff::pipeline::DEFAULT_TARGET;
use liftoff::target::TargetInfo;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ListArgs {}

#[derive(Serialize)]
pub struct ListOutput {
    pub default: &'static str,
    pub targets: Vec<TargetInfo>,
}

pub fn run(_args: ListArgs, global: &GlobalArgs) -> CmdResult<ListOutput> {
    let session = global.open_session()?;
    Ok((
        ListOutput {
            default: DEFAULT_TARGET,
            targets: session.graph().describe(),
        },
        0,
    ))
}
