use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rk::{DocumentInfo, DocumentSet, EnvPrompt, ServerId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::resolve::descriptor_json;
use crate::context::CommandContext;
use crate::prompt::TOKEN_ENV;

#[derive(Debug, PartialEq, Eq)]
enum Event {
	Open(DocumentInfo),
	Close(PathBuf),
	Resolve(ServerId),
}

fn parse_event(line: &str) -> Option<Event> {
	let mut parts = line.split_whitespace();
	match (parts.next()?, parts.next()) {
		("open", Some(path)) => {
			let doc = match parts.next() {
				Some(language) => DocumentInfo::new(path, language),
				None if path.ends_with(".ipynb") => DocumentInfo::notebook(path),
				None => DocumentInfo::new(path, "plaintext"),
			};
			Some(Event::Open(doc))
		}
		("close", Some(path)) => Some(Event::Close(PathBuf::from(path))),
		("resolve", Some(id)) => Some(Event::Resolve(ServerId::from(id))),
		_ => None,
	}
}

pub async fn execute(ctx: &CommandContext) -> Result<()> {
	// Stdin carries events here, so the token comes from the file or RK_TOKEN.
	let provider = ctx.provider_with(Arc::new(EnvPrompt::new(TOKEN_ENV)))?;
	let docs = Arc::new(DocumentSet::new());
	let (closed_tx, closed_rx) = mpsc::unbounded_channel();
	provider.watch_documents(closed_rx, docs.clone());

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let Some(event) = parse_event(line) else {
			warn!(target = "rk", line, "unrecognized event");
			continue;
		};
		debug!(target = "rk", ?event, "event");

		match event {
			Event::Open(doc) => docs.open(doc),
			Event::Close(path) => {
				for doc in docs.close(&path) {
					let _ = closed_tx.send(doc);
				}
			}
			Event::Resolve(id) => {
				let label = id.as_str().to_string();
				match provider.resolve_server(rk::ServerDescriptor::unresolved(id, label)).await {
					Ok(server) => println!("{}", descriptor_json(&server)),
					Err(err) => warn!(target = "rk", error = %err, "resolve failed"),
				}
			}
		}
	}

	drop(closed_tx);
	provider.dispose().await;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_events() {
		assert_eq!(parse_event("open /a/b.ipynb"), Some(Event::Open(DocumentInfo::notebook("/a/b.ipynb"))));
		assert_eq!(parse_event("open /a/main.py python"), Some(Event::Open(DocumentInfo::new("/a/main.py", "python"))));
		assert_eq!(parse_event("close /a/b.ipynb"), Some(Event::Close(PathBuf::from("/a/b.ipynb"))));
		assert_eq!(parse_event("resolve thunder-compute-t4"), Some(Event::Resolve(ServerId::from("thunder-compute-t4"))));
	}

	#[test]
	fn rejects_malformed_events() {
		assert_eq!(parse_event("close"), None);
		assert_eq!(parse_event("reboot now"), None);
	}
}
