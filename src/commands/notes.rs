use std::collections::HashMap;

use clap::Args;

use liftoff::changelog::{self, SectionSelector};
use liftoff::release::{self, ReleaseNotes};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct NotesArgs {
    /// Release tag used as the header (defaults to v<major.minor.patch>)
    #[arg(long)]
    pub tag: Option<String>,

    /// Changelog section label (defaults to the most recent section)
    #[arg(long)]
    pub section: Option<String>,
}

pub fn run(args: NotesArgs, global: &GlobalArgs) -> CmdResult<ReleaseNotes> {
    let session = global.open_session()?;
    let path = session.root().join(&session.project().pipeline.changelog);
    let content = changelog::read(&path)?;

    let tag = match args.tag {
        Some(tag) => tag,
        None => session.version(&session.resolver(HashMap::new()))?.release_tag(),
    };
    let selector = SectionSelector::from_label(args.section.as_deref());

    Ok((release::notes_from_changelog(&content, &selector, &tag)?, 0))
}
