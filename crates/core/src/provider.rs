//! Server provider: discovery, single-flight resolution and teardown.
//!
//! [`ServerProvider`] is the contract handed to the kernel-connection
//! layer. Discovery ([`ServerProvider::list_servers`]) is offline and only
//! names the tiers of the active collection. Resolution
//! ([`ServerProvider::resolve_server`]) provisions a server through the
//! gateway and caches the result.
//!
//! # Single-flight
//!
//! At most one provisioning attempt runs per provider. The attempt is a
//! [`Shared`] future stored in the provider state; callers asking for the
//! same server while it runs await that future and receive the identical
//! `Result`. Callers asking for a *different* server wait for the running
//! attempt to settle and then start their own, so attempts never overlap.
//!
//! The attempt runs on its own task and clears the in-flight marker on
//! both success and failure, so a failed attempt can be retried and a
//! caller that gives up waiting does not leave provisioning half-done.
//!
//! ```text
//! Unresolved ──resolve──▶ Resolving ──ok──▶ Resolved
//!      ▲                      │
//!      └──────resolve──── Failed ◀──err──┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::credential::{CredentialPrompt, CredentialStore};
use crate::documents::{DocumentInfo, OpenDocuments};
use crate::error::{ProviderError, Result};
use crate::gateway::{HttpGateway, SessionGateway};
use crate::lifecycle::{SessionHandle, SessionTracker};
use crate::server::{ConnectionInfo, ServerDescriptor, ServerId, Tier, TierCollection};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

type SharedAttempt = Shared<BoxFuture<'static, Result<ServerDescriptor>>>;

/// Resolution state of one server id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
	Unresolved,
	Resolving,
	Resolved,
	Failed,
}

/// Fired when the set of listed servers changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServersChanged {
	pub collection: String,
}

struct InFlight {
	server_id: ServerId,
	attempt: SharedAttempt,
}

struct ProviderState {
	active_collection: String,
	resolved: HashMap<ServerId, ServerDescriptor>,
	failed: HashSet<ServerId>,
	in_flight: Option<InFlight>,
}

impl ProviderState {
	/// Cached descriptor for `id`, evicting it if its session has since
	/// been torn down.
	fn cached(&mut self, id: &ServerId, tracker: &SessionTracker) -> Option<ServerDescriptor> {
		let cached = self.resolved.get(id)?;
		if tracker.contains(id) {
			return Some(cached.clone());
		}
		debug!(target = "rk.provider", server = %id, "cached server was cleaned up; evicting");
		self.resolved.remove(id);
		None
	}
}

enum Pending {
	/// Attempt for the requested server.
	Join(SharedAttempt),
	/// Attempt for another server; wait, then re-check.
	Wait(SharedAttempt),
}

struct Inner {
	config: ProviderConfig,
	credentials: Arc<CredentialStore>,
	gateway: Arc<dyn SessionGateway>,
	tracker: Arc<SessionTracker>,
	state: Mutex<ProviderState>,
	provisioning: AtomicBool,
	disposed: AtomicBool,
	changes: broadcast::Sender<ServersChanged>,
}

/// Resets the provisioning flag when an attempt ends, however it ends.
struct ProvisioningGuard<'a>(&'a AtomicBool);

impl Drop for ProvisioningGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

impl Inner {
	fn tier(&self, id: &ServerId) -> Option<Tier> {
		self.config.collections.iter().find_map(|c| c.tier(id)).cloned()
	}

	fn collection(&self, id: &str) -> Option<&TierCollection> {
		self.config.collections.iter().find(|c| c.id == id)
	}

	/// Starts provisioning `tier` on a new task and returns the shared outcome.
	fn start_attempt(self: &Arc<Self>, tier: Tier) -> SharedAttempt {
		let inner = Arc::clone(self);
		let server_id = tier.id.clone();
		let task = tokio::spawn(async move {
			let result = inner.provision(&tier).await;
			inner.settle(&tier.id, &result);
			result
		});

		let inner = Arc::clone(self);
		async move {
			match task.await {
				Ok(result) => result,
				Err(err) => {
					let err = ProviderError::Transport(format!("provisioning task failed: {err}"));
					inner.settle(&server_id, &Err(err.clone()));
					Err(err)
				}
			}
		}
		.boxed()
		.shared()
	}

	async fn provision(&self, tier: &Tier) -> Result<ServerDescriptor> {
		if self.provisioning.swap(true, Ordering::SeqCst) {
			return Err(ProviderError::AlreadyProvisioning);
		}
		let _guard = ProvisioningGuard(&self.provisioning);

		info!(target = "rk.provider", server = %tier.id, "connecting to {}", tier.label);
		let credential = self.credentials.get_credential().await?;
		debug!(target = "rk.provider", "auth token retrieved");

		let data = match self.gateway.start_session(&credential, tier).await {
			Ok(data) => data,
			Err(ProviderError::Unauthorized) => {
				// Re-read the token file on the next attempt.
				self.credentials.forget().await;
				return Err(ProviderError::Unauthorized);
			}
			Err(err) => return Err(err),
		};
		let info = ConnectionInfo::new(data.base_url.clone(), data.token.clone(), self.config.connection_options.clone());
		self.tracker.register(
			tier.id.clone(),
			SessionHandle {
				server_id: tier.id.clone(),
				base_url: data.base_url,
				token: data.token,
			},
		);

		let grace = self.config.startup_grace;
		if !grace.is_zero() {
			debug!(target = "rk.provider", grace_ms = grace.as_millis() as u64, "waiting for server startup");
			tokio::time::sleep(grace).await;
		}

		info!(target = "rk.provider", server = %tier.id, base_url = %info.base_url(), "connected to {}", tier.label);
		Ok(ServerDescriptor::resolved(tier.id.clone(), tier.label.clone(), info))
	}

	/// Records the outcome of an attempt and clears the in-flight marker.
	fn settle(&self, id: &ServerId, result: &Result<ServerDescriptor>) {
		let mut state = self.state.lock();
		if state.in_flight.as_ref().is_some_and(|f| &f.server_id == id) {
			state.in_flight = None;
		}
		match result {
			Ok(server) => {
				state.failed.remove(id);
				state.resolved.insert(id.clone(), server.clone());
			}
			Err(err) => {
				state.failed.insert(id.clone());
				drop(state);
				error!(target = "rk.provider", server = %id, error = %err, "compute server connection failed");
			}
		}
	}
}

pub struct ServerProvider {
	inner: Arc<Inner>,
	listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl ServerProvider {
	pub fn new(config: ProviderConfig, credentials: Arc<CredentialStore>, gateway: Arc<dyn SessionGateway>) -> Result<Self> {
		if !config.collections.iter().any(|c| c.id == config.default_collection) {
			return Err(ProviderError::UnknownCollection(config.default_collection.clone()));
		}

		let tracker = Arc::new(SessionTracker::new(Arc::clone(&credentials), Arc::clone(&gateway)));
		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		let state = ProviderState {
			active_collection: config.default_collection.clone(),
			resolved: HashMap::new(),
			failed: HashSet::new(),
			in_flight: None,
		};

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				credentials,
				gateway,
				tracker,
				state: Mutex::new(state),
				provisioning: AtomicBool::new(false),
				disposed: AtomicBool::new(false),
				changes,
			}),
			listeners: Mutex::new(Vec::new()),
		})
	}

	/// Provider over HTTP with a file-backed credential at the configured path.
	pub fn from_config(config: ProviderConfig, prompt: Arc<dyn CredentialPrompt>) -> Result<Self> {
		let credentials = Arc::new(CredentialStore::new(config.credential_path.clone(), prompt));
		let gateway = Arc::new(HttpGateway::new(&config)?);
		Self::new(config, credentials, gateway)
	}

	pub fn config(&self) -> &ProviderConfig {
		&self.inner.config
	}

	pub fn credentials(&self) -> &Arc<CredentialStore> {
		&self.inner.credentials
	}

	pub fn tracker(&self) -> &Arc<SessionTracker> {
		&self.inner.tracker
	}

	pub fn active_collection(&self) -> String {
		self.inner.state.lock().active_collection.clone()
	}

	/// Switches the listed collection and notifies subscribers on change.
	pub fn set_collection(&self, id: &str) -> Result<()> {
		if self.inner.collection(id).is_none() {
			return Err(ProviderError::UnknownCollection(id.to_string()));
		}
		let mut state = self.inner.state.lock();
		if state.active_collection == id {
			return Ok(());
		}
		state.active_collection = id.to_string();
		drop(state);

		debug!(target = "rk.provider", collection = id, "active collection changed");
		// No subscribers is fine.
		let _ = self.inner.changes.send(ServersChanged { collection: id.to_string() });
		Ok(())
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ServersChanged> {
		self.inner.changes.subscribe()
	}

	/// Tiers of the active collection, unresolved. Never touches the network.
	pub fn list_servers(&self) -> Vec<ServerDescriptor> {
		let active = self.active_collection();
		self.inner
			.collection(&active)
			.map(|c| c.tiers.iter().map(Tier::descriptor).collect())
			.unwrap_or_default()
	}

	/// Free-text server entry is not offered.
	pub fn supports_quick_pick(&self) -> bool {
		false
	}

	pub fn handle_quick_pick(&self) -> Result<ServerDescriptor> {
		Err(ProviderError::QuickPickUnsupported)
	}

	pub fn server_state(&self, id: &ServerId) -> ServerState {
		let state = self.inner.state.lock();
		if state.in_flight.as_ref().is_some_and(|f| &f.server_id == id) {
			ServerState::Resolving
		} else if state.resolved.contains_key(id) && self.inner.tracker.contains(id) {
			ServerState::Resolved
		} else if state.failed.contains(id) {
			ServerState::Failed
		} else {
			ServerState::Unresolved
		}
	}

	/// Returns `descriptor` with connection info, provisioning if needed.
	pub async fn resolve_server(&self, descriptor: ServerDescriptor) -> Result<ServerDescriptor> {
		if descriptor.is_resolved() {
			return Ok(descriptor);
		}

		loop {
			let pending = {
				let mut state = self.inner.state.lock();
				if let Some(cached) = state.cached(&descriptor.id, &self.inner.tracker) {
					return Ok(cached);
				}
				match &state.in_flight {
					Some(in_flight) if in_flight.server_id == descriptor.id => Pending::Join(in_flight.attempt.clone()),
					Some(in_flight) => Pending::Wait(in_flight.attempt.clone()),
					None if self.inner.disposed.load(Ordering::SeqCst) => return Err(ProviderError::Disposed),
					None => {
						let tier = self.inner.tier(&descriptor.id).ok_or_else(|| ProviderError::UnknownServer(descriptor.id.clone()))?;
						let attempt = self.inner.start_attempt(tier);
						state.in_flight = Some(InFlight {
							server_id: descriptor.id.clone(),
							attempt: attempt.clone(),
						});
						Pending::Join(attempt)
					}
				}
			};

			match pending {
				Pending::Join(attempt) => return attempt.await,
				Pending::Wait(attempt) => {
					debug!(target = "rk.provider", server = %descriptor.id, "waiting for another server's provisioning");
					let _ = attempt.await;
				}
			}
		}
	}

	/// Feeds document-close events to session cleanup until `closed` ends
	/// or the provider is disposed.
	pub fn watch_documents(&self, mut closed: mpsc::UnboundedReceiver<DocumentInfo>, open: Arc<dyn OpenDocuments>) {
		let tracker = Arc::clone(&self.inner.tracker);
		let handle = tokio::spawn(async move {
			while let Some(doc) = closed.recv().await {
				let open_documents = open.open_documents();
				tracker.on_document_closed(&doc, &open_documents).await;
			}
			debug!(target = "rk.provider", "document feed closed");
		});
		self.listeners.lock().push(handle);
	}

	/// Stops listeners and tears down every tracked session, including one
	/// still being provisioned. Later resolves fail with `Disposed`.
	pub async fn dispose(&self) {
		self.inner.disposed.store(true, Ordering::SeqCst);
		for listener in self.listeners.lock().drain(..) {
			listener.abort();
		}

		loop {
			let in_flight = self.inner.state.lock().in_flight.as_ref().map(|f| f.attempt.clone());
			let Some(attempt) = in_flight else {
				break;
			};
			debug!(target = "rk.provider", "waiting for in-flight provisioning before teardown");
			let _ = attempt.await;
		}
		self.inner.tracker.unregister_all().await;
	}
}

impl Drop for ServerProvider {
	fn drop(&mut self) {
		for listener in self.listeners.get_mut().drain(..) {
			listener.abort();
		}
	}
}
