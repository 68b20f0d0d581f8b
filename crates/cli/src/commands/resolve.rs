use anyhow::{Context, Result};
use rk::{ServerDescriptor, ServerId};
use serde_json::{Value, json};
use tracing::info;

use crate::context::CommandContext;

pub async fn execute(id: &str, ctx: &CommandContext) -> Result<()> {
	let provider = ctx.provider()?;
	let id = ServerId::from(id);
	let server = provider
		.list_servers()
		.into_iter()
		.find(|s| s.id == id)
		.unwrap_or_else(|| ServerDescriptor::unresolved(id.clone(), id.as_str()));

	let resolved = provider.resolve_server(server).await.with_context(|| format!("failed to resolve {id}"))?;
	info!(target = "rk", server = %resolved.id, "server ready");
	println!("{}", descriptor_json(&resolved));
	Ok(())
}

/// JSON line describing a resolved server, token included.
pub(super) fn descriptor_json(server: &ServerDescriptor) -> Value {
	match &server.connection_info {
		Some(info) => json!({
			"id": server.id.as_str(),
			"label": server.label,
			"baseUrl": info.base_url().as_str(),
			"token": info.token(),
		}),
		None => json!({
			"id": server.id.as_str(),
			"label": server.label,
		}),
	}
}
