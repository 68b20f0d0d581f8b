use anyhow::Result;

use crate::context::CommandContext;

pub fn execute(ctx: &CommandContext) -> Result<()> {
	let provider = ctx.provider()?;
	for server in provider.list_servers() {
		println!("{}\t{}", server.id, server.label);
	}
	Ok(())
}
