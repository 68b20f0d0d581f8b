use std::sync::Arc;

use rk::{CredentialPrompt, PreferredKernelStore, ProviderConfig, ServerProvider};

use crate::prompt::TerminalPrompt;

/// Settings shared by every command: environment defaults plus global flags.
#[derive(Debug, Clone)]
pub struct CommandContext {
	endpoint: Option<String>,
	collection: Option<String>,
}

impl CommandContext {
	pub fn new(endpoint: Option<String>, collection: Option<String>) -> Self {
		Self { endpoint, collection }
	}

	pub fn config(&self) -> ProviderConfig {
		let config = ProviderConfig::from_env();
		match &self.endpoint {
			Some(endpoint) => config.with_endpoint(endpoint.as_str()),
			None => config,
		}
	}

	pub fn provider(&self) -> rk::Result<ServerProvider> {
		self.provider_with(Arc::new(TerminalPrompt))
	}

	pub fn provider_with(&self, prompt: Arc<dyn CredentialPrompt>) -> rk::Result<ServerProvider> {
		let provider = ServerProvider::from_config(self.config(), prompt)?;
		if let Some(collection) = &self.collection {
			provider.set_collection(collection)?;
		}
		Ok(provider)
	}

	pub fn preferred_kernels(&self) -> PreferredKernelStore {
		PreferredKernelStore::load(self.config().preferred_kernels_path())
	}
}
