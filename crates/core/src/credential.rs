//! Provider credential resolution with interactive fallback.
//!
//! The credential is a single-line bearer token kept in a plain-text file.
//! When the file is missing or empty the injected [`CredentialPrompt`] is
//! asked once; the answer is written back so later runs skip the prompt.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

/// Opaque, non-empty bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
	/// Returns `None` for blank input.
	pub fn new(raw: &str) -> Option<Self> {
		let trimmed = raw.trim();
		(!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}

impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Credential(<redacted>)")
	}
}

/// Source of a credential when none is persisted.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
	/// Asks for a credential. `None` means the user cancelled.
	async fn prompt(&self) -> Option<String>;
}

/// Reads the credential from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvPrompt {
	var: String,
}

impl EnvPrompt {
	pub fn new(var: impl Into<String>) -> Self {
		Self { var: var.into() }
	}
}

#[async_trait]
impl CredentialPrompt for EnvPrompt {
	async fn prompt(&self) -> Option<String> {
		std::env::var(&self.var).ok()
	}
}

/// Fixed answer; `None` behaves like a cancelled prompt.
#[derive(Debug, Default)]
pub struct StaticPrompt {
	answer: Option<String>,
	asked: AtomicUsize,
}

impl StaticPrompt {
	pub fn answering(answer: impl Into<String>) -> Self {
		Self {
			answer: Some(answer.into()),
			asked: AtomicUsize::new(0),
		}
	}

	pub fn cancelled() -> Self {
		Self::default()
	}

	/// Number of times the prompt was shown.
	pub fn asked(&self) -> usize {
		self.asked.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl CredentialPrompt for StaticPrompt {
	async fn prompt(&self) -> Option<String> {
		self.asked.fetch_add(1, Ordering::SeqCst);
		self.answer.clone()
	}
}

/// Lazily populated, file-backed credential cache.
pub struct CredentialStore {
	path: PathBuf,
	prompt: Arc<dyn CredentialPrompt>,
	cached: Mutex<Option<Credential>>,
}

impl CredentialStore {
	pub fn new(path: impl Into<PathBuf>, prompt: Arc<dyn CredentialPrompt>) -> Self {
		Self {
			path: path.into(),
			prompt,
			cached: Mutex::new(None),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the cached credential, reading or prompting on first use.
	///
	/// Concurrent callers queue on the cache lock, so the prompt is shown
	/// at most once per miss.
	pub async fn get_credential(&self) -> Result<Credential> {
		let mut cached = self.cached.lock().await;
		if let Some(credential) = cached.as_ref() {
			return Ok(credential.clone());
		}

		let credential = match self.read_persisted().await {
			Some(credential) => credential,
			None => {
				info!(target = "rk.credential", path = %self.path.display(), "no stored token; prompting");
				let entered = self.prompt.prompt().await;
				let credential = entered.as_deref().and_then(Credential::new).ok_or(ProviderError::CredentialRequired)?;
				self.persist(&credential).await?;
				credential
			}
		};

		*cached = Some(credential.clone());
		Ok(credential)
	}

	/// Drops the in-memory credential; the file is left untouched.
	pub async fn forget(&self) {
		self.cached.lock().await.take();
	}

	async fn read_persisted(&self) -> Option<Credential> {
		match tokio::fs::read_to_string(&self.path).await {
			Ok(content) => {
				let credential = Credential::new(&content);
				if credential.is_none() {
					debug!(target = "rk.credential", path = %self.path.display(), "token file is empty");
				}
				credential
			}
			Err(err) => {
				debug!(target = "rk.credential", path = %self.path.display(), error = %err, "token file unreadable");
				None
			}
		}
	}

	async fn persist(&self, credential: &Credential) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await.map_err(|e| ProviderError::storage(parent, e))?;
			}
		}
		tokio::fs::write(&self.path, credential.as_str())
			.await
			.map_err(|e| ProviderError::storage(&self.path, e))?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			if let Err(err) = tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await {
				warn!(target = "rk.credential", path = %self.path.display(), error = %err, "failed to restrict token file permissions");
			}
		}

		debug!(target = "rk.credential", path = %self.path.display(), "token saved");
		Ok(())
	}
}
