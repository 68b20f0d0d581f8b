mod end;
mod prefer;
mod resolve;
mod servers;
mod watch;

use anyhow::Result;

use crate::cli::{Commands, PreferAction};
use crate::context::CommandContext;

pub async fn dispatch(command: Commands, ctx: CommandContext) -> Result<()> {
	match command {
		Commands::Servers => servers::execute(&ctx),
		Commands::Resolve { id } => resolve::execute(&id, &ctx).await,
		Commands::End => end::execute(&ctx).await,
		Commands::Watch => watch::execute(&ctx).await,
		Commands::Prefer { action } => match action {
			PreferAction::Get { notebook } => prefer::get(&notebook, &ctx),
			PreferAction::Set { notebook, kernel } => prefer::set(&notebook, &kernel, &ctx),
			PreferAction::Clear { notebook } => prefer::clear(&notebook, &ctx),
			PreferAction::Select { notebook, kernels } => prefer::select(&notebook, &kernels, &ctx),
		},
	}
}
