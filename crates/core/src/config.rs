//! Provider endpoint, timeouts, on-disk locations and tier catalog.
//!
//! Defaults mirror the provider's production deployment. Environment
//! variables are read once by [`ProviderConfig::from_env`]; embedders that
//! need explicit control build the config directly and use the `with_*`
//! helpers.

use std::path::PathBuf;
use std::time::Duration;

use crate::server::{ConnectionOptions, TierCollection, default_collections};

pub const PRODUCTION_ENDPOINT: &str = "https://api.thundercompute.com:8443";
pub const DEVELOPMENT_ENDPOINT: &str = "http://localhost:8080";

/// Overrides the provider endpoint outright.
pub const ENDPOINT_ENV: &str = "RK_API_ENDPOINT";
/// `development` selects [`DEVELOPMENT_ENDPOINT`].
pub const ENVIRONMENT_ENV: &str = "RK_ENV";
pub const CONFIG_DIR_ENV: &str = "RK_CONFIG_DIR";
pub const TOKEN_FILE_ENV: &str = "RK_TOKEN_FILE";

/// Provisioning can take minutes while the provider boots an instance.
pub const START_TIMEOUT: Duration = Duration::from_secs(300);
pub const END_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay after a successful start before the server is handed out.
pub const STARTUP_GRACE: Duration = Duration::from_secs(6);

const TOKEN_FILE: &str = ".thunder/token";
const SERVICE_NAME: &str = "rk";
const PREFERRED_KERNELS_FILE: &str = "preferred-kernels.json";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
	pub api_endpoint: String,
	pub start_timeout: Duration,
	pub end_timeout: Duration,
	pub startup_grace: Duration,
	pub credential_path: PathBuf,
	pub config_dir: PathBuf,
	pub collections: Vec<TierCollection>,
	pub default_collection: String,
	pub connection_options: ConnectionOptions,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		let collections = default_collections();
		let default_collection = collections.first().map(|c| c.id.clone()).unwrap_or_default();
		Self {
			api_endpoint: PRODUCTION_ENDPOINT.to_string(),
			start_timeout: START_TIMEOUT,
			end_timeout: END_TIMEOUT,
			startup_grace: STARTUP_GRACE,
			credential_path: default_credential_path(),
			config_dir: default_config_dir(),
			collections,
			default_collection,
			connection_options: ConnectionOptions::default(),
		}
	}
}

impl ProviderConfig {
	/// Defaults with environment overrides applied.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if std::env::var(ENVIRONMENT_ENV).is_ok_and(|env| env.eq_ignore_ascii_case("development")) {
			config.api_endpoint = DEVELOPMENT_ENDPOINT.to_string();
		}
		if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
			config.api_endpoint = endpoint;
		}
		if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
			config.config_dir = PathBuf::from(dir);
		}
		if let Some(path) = std::env::var_os(TOKEN_FILE_ENV) {
			config.credential_path = PathBuf::from(path);
		}
		config
	}

	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.api_endpoint = endpoint.into();
		self
	}

	pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
		self.start_timeout = timeout;
		self
	}

	pub fn with_end_timeout(mut self, timeout: Duration) -> Self {
		self.end_timeout = timeout;
		self
	}

	pub fn with_startup_grace(mut self, grace: Duration) -> Self {
		self.startup_grace = grace;
		self
	}

	pub fn with_credential_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.credential_path = path.into();
		self
	}

	pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.config_dir = dir.into();
		self
	}

	pub fn with_default_collection(mut self, id: impl Into<String>) -> Self {
		self.default_collection = id.into();
		self
	}

	/// Endpoint URL for a control API path, without doubled slashes.
	pub fn endpoint_url(&self, path: &str) -> String {
		format!("{}/{}", self.api_endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
	}

	pub fn preferred_kernels_path(&self) -> PathBuf {
		self.config_dir.join(PREFERRED_KERNELS_FILE)
	}
}

fn default_credential_path() -> PathBuf {
	dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(TOKEN_FILE)
}

fn default_config_dir() -> PathBuf {
	dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(SERVICE_NAME)
}
