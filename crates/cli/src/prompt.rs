//! Credential prompts for a terminal host.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use rk::CredentialPrompt;
use tracing::debug;

/// Environment variable consulted before asking on the terminal.
pub const TOKEN_ENV: &str = "RK_TOKEN";

/// Asks for the provider token on stderr and reads one line from stdin.
///
/// End of input or a blank line counts as cancellation.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
	async fn prompt(&self) -> Option<String> {
		if let Ok(token) = std::env::var(TOKEN_ENV) {
			debug!(target = "rk.prompt", "using token from {TOKEN_ENV}");
			return Some(token);
		}

		tokio::task::spawn_blocking(read_token).await.ok().flatten()
	}
}

fn read_token() -> Option<String> {
	let mut stderr = io::stderr();
	let _ = write!(stderr, "Enter your provider API token: ");
	let _ = stderr.flush();

	let mut line = String::new();
	match io::stdin().lock().read_line(&mut line) {
		Ok(0) | Err(_) => None,
		Ok(_) => {
			let token = line.trim();
			(!token.is_empty()).then(|| token.to_string())
		}
	}
}
