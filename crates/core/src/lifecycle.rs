//! Live session bookkeeping and best-effort teardown.
//!
//! Every resolved server registers a [`SessionHandle`] here. Handles leave
//! the tracker only when the provider confirms the session is gone: a
//! successful end call, or a 404 meaning there was nothing left to end.
//! Teardown failures are logged and never surface to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::credential::CredentialStore;
use crate::documents::DocumentInfo;
use crate::error::{ProviderError, Result};
use crate::gateway::SessionGateway;
use crate::server::{BaseUrl, ServerId};

/// Live kernel server session kept for cleanup.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle {
	pub server_id: ServerId,
	pub base_url: BaseUrl,
	pub token: String,
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("server_id", &self.server_id)
			.field("base_url", &self.base_url)
			.field("token", &"<redacted>")
			.finish()
	}
}

pub struct SessionTracker {
	sessions: Mutex<HashMap<ServerId, SessionHandle>>,
	credentials: Arc<CredentialStore>,
	gateway: Arc<dyn SessionGateway>,
}

impl SessionTracker {
	pub fn new(credentials: Arc<CredentialStore>, gateway: Arc<dyn SessionGateway>) -> Self {
		Self {
			sessions: Mutex::new(HashMap::new()),
			credentials,
			gateway,
		}
	}

	/// Tracks `handle` under `id`, replacing any previous handle.
	pub fn register(&self, id: ServerId, handle: SessionHandle) {
		debug!(target = "rk.lifecycle", server = %id, base_url = %handle.base_url, "session registered");
		self.sessions.lock().insert(id, handle);
	}

	pub fn contains(&self, id: &ServerId) -> bool {
		self.sessions.lock().contains_key(id)
	}

	pub fn handles(&self) -> Vec<SessionHandle> {
		self.sessions.lock().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}

	/// Ends the session tracked under `id`. Returns whether it was released.
	pub async fn cleanup_one(&self, id: &ServerId) -> bool {
		let Some(handle) = self.sessions.lock().get(id).cloned() else {
			return false;
		};

		match self.end_session().await {
			Ok(()) => {
				info!(target = "rk.lifecycle", server = %id, "session ended");
				self.release(id, &handle);
				true
			}
			Err(ProviderError::NoActiveSession) => {
				debug!(target = "rk.lifecycle", server = %id, "no active session; treating as clean");
				self.release(id, &handle);
				true
			}
			Err(err) => {
				warn!(target = "rk.lifecycle", server = %id, error = %err, "failed to clean up session");
				false
			}
		}
	}

	/// Ends every tracked session concurrently and waits for all of them.
	pub async fn unregister_all(&self) {
		let ids: Vec<ServerId> = self.sessions.lock().keys().cloned().collect();
		if ids.is_empty() {
			return;
		}
		info!(target = "rk.lifecycle", count = ids.len(), "cleaning up all sessions");
		let released = join_all(ids.iter().map(|id| self.cleanup_one(id))).await;
		let remaining = released.iter().filter(|ok| !**ok).count();
		if remaining > 0 {
			warn!(target = "rk.lifecycle", remaining, "some sessions could not be cleaned up");
		}
	}

	/// Reacts to a closed document. When it was a notebook and no other
	/// notebook remains open, every tracked session is torn down, not only
	/// the ones the closed notebook used. Returns whether cleanup ran.
	pub async fn on_document_closed(&self, closed: &DocumentInfo, open_documents: &[DocumentInfo]) -> bool {
		if !closed.is_notebook() {
			return false;
		}
		let notebooks_open = open_documents.iter().any(|doc| doc.path != closed.path && doc.is_notebook());
		if notebooks_open {
			debug!(target = "rk.lifecycle", path = %closed.path.display(), "notebook closed; others still open");
			return false;
		}
		info!(target = "rk.lifecycle", path = %closed.path.display(), "last notebook closed");
		self.unregister_all().await;
		true
	}

	async fn end_session(&self) -> Result<()> {
		let credential = self.credentials.get_credential().await?;
		let result = self.gateway.end_session(&credential).await;
		if result == Err(ProviderError::Unauthorized) {
			self.credentials.forget().await;
		}
		result
	}

	/// Drops `handle` unless a newer session replaced it meanwhile.
	fn release(&self, id: &ServerId, handle: &SessionHandle) {
		let mut sessions = self.sessions.lock();
		if sessions.get(id) == Some(handle) {
			sessions.remove(id);
		}
	}
}
