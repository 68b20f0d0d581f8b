use anyhow::Result;
use rk::{HttpGateway, ProviderError, SessionGateway};

use crate::context::CommandContext;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
	let provider = ctx.provider()?;
	let credential = provider.credentials().get_credential().await?;
	let gateway = HttpGateway::new(provider.config())?;

	match gateway.end_session(&credential).await {
		Ok(()) => println!("session ended"),
		Err(ProviderError::NoActiveSession) => println!("no active session"),
		Err(err) => return Err(err.into()),
	}
	Ok(())
}
