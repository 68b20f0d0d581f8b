//! Scripted [`SessionGateway`] for exercising provisioning without a provider.
//!
//! Responses are queued per operation; when a queue runs dry the gateway
//! falls back to success. Call counters let tests assert how many requests
//! actually reached the "network".
//!
//! # Example
//!
//! ```ignore
//! let gateway = Arc::new(FakeGateway::new());
//! gateway.push_start(Err(ProviderError::BillingRequired));
//! // ... resolve a server through a provider built on `gateway` ...
//! assert_eq!(gateway.start_calls(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::credential::Credential;
use crate::error::Result;
use crate::gateway::{SessionConnectionData, SessionGateway};
use crate::server::{BaseUrl, Tier};

pub const FAKE_BASE_URL: &str = "http://10.0.0.1:8888";
pub const FAKE_TOKEN: &str = "fake-jupyter-token";

#[derive(Debug, Default)]
pub struct FakeGateway {
	start_results: Mutex<VecDeque<Result<SessionConnectionData>>>,
	end_results: Mutex<VecDeque<Result<()>>>,
	start_delay: Duration,
	start_calls: AtomicUsize,
	end_calls: AtomicUsize,
	starts_running: AtomicUsize,
	max_concurrent_starts: AtomicUsize,
	started: Mutex<Vec<String>>,
	credentials_seen: Mutex<Vec<String>>,
}

impl FakeGateway {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every start call sleep before answering.
	pub fn with_start_delay(mut self, delay: Duration) -> Self {
		self.start_delay = delay;
		self
	}

	pub fn push_start(&self, result: Result<SessionConnectionData>) {
		self.start_results.lock().push_back(result);
	}

	pub fn push_end(&self, result: Result<()>) {
		self.end_results.lock().push_back(result);
	}

	pub fn start_calls(&self) -> usize {
		self.start_calls.load(Ordering::SeqCst)
	}

	pub fn end_calls(&self) -> usize {
		self.end_calls.load(Ordering::SeqCst)
	}

	pub fn network_calls(&self) -> usize {
		self.start_calls() + self.end_calls()
	}

	/// Highest number of start calls observed running at the same time.
	pub fn max_concurrent_starts(&self) -> usize {
		self.max_concurrent_starts.load(Ordering::SeqCst)
	}

	/// `gpu_type` of every start call, in call order.
	pub fn started_gpu_types(&self) -> Vec<String> {
		self.started.lock().clone()
	}

	pub fn credentials_seen(&self) -> Vec<String> {
		self.credentials_seen.lock().clone()
	}

	fn default_connection() -> Result<SessionConnectionData> {
		Ok(SessionConnectionData {
			base_url: BaseUrl::parse(FAKE_BASE_URL)?,
			token: FAKE_TOKEN.to_string(),
		})
	}
}

#[async_trait]
impl SessionGateway for FakeGateway {
	async fn start_session(&self, credential: &Credential, tier: &Tier) -> Result<SessionConnectionData> {
		self.start_calls.fetch_add(1, Ordering::SeqCst);
		self.started.lock().push(tier.gpu_type.clone());
		self.credentials_seen.lock().push(credential.as_str().to_string());
		let running = self.starts_running.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_concurrent_starts.fetch_max(running, Ordering::SeqCst);
		if !self.start_delay.is_zero() {
			tokio::time::sleep(self.start_delay).await;
		}
		self.starts_running.fetch_sub(1, Ordering::SeqCst);
		let scripted = self.start_results.lock().pop_front();
		scripted.unwrap_or_else(Self::default_connection)
	}

	async fn end_session(&self, credential: &Credential) -> Result<()> {
		self.end_calls.fetch_add(1, Ordering::SeqCst);
		self.credentials_seen.lock().push(credential.as_str().to_string());
		let scripted = self.end_results.lock().pop_front();
		scripted.unwrap_or(Ok(()))
	}
}
