//! Timeout-bounded calls to the provider control API.
//!
//! [`SessionGateway`] is the seam between provisioning logic and the
//! network; [`HttpGateway`] is the production implementation over
//! `reqwest`. Every call runs under a wall-clock deadline. When it expires
//! the request future is dropped, which aborts the transport operation,
//! and the caller sees [`ProviderError::Timeout`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use rk_protocol::{END_PATH, START_PATH, StartSessionRequest, StartSessionResponse};
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::credential::Credential;
use crate::error::{ProviderError, Result};
use crate::server::{BaseUrl, Tier};

const USER_AGENT: &str = concat!("rk/", env!("CARGO_PKG_VERSION"));

/// Location and token of a freshly started kernel server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConnectionData {
	pub base_url: BaseUrl,
	pub token: String,
}

/// Provider control operations.
#[async_trait]
pub trait SessionGateway: Send + Sync {
	/// Provisions a kernel server for `tier`.
	async fn start_session(&self, credential: &Credential, tier: &Tier) -> Result<SessionConnectionData>;

	/// Tears down the kernel server owned by `credential`.
	async fn end_session(&self, credential: &Credential) -> Result<()>;
}

/// [`SessionGateway`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpGateway {
	client: Client,
	start_url: String,
	end_url: String,
	start_timeout: Duration,
	end_timeout: Duration,
}

impl HttpGateway {
	pub fn new(config: &ProviderConfig) -> Result<Self> {
		let client = Client::builder()
			.user_agent(USER_AGENT)
			.build()
			.map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
		Ok(Self::with_client(client, config))
	}

	pub fn with_client(client: Client, config: &ProviderConfig) -> Self {
		Self {
			client,
			start_url: config.endpoint_url(START_PATH),
			end_url: config.endpoint_url(END_PATH),
			start_timeout: config.start_timeout,
			end_timeout: config.end_timeout,
		}
	}
}

#[async_trait]
impl SessionGateway for HttpGateway {
	async fn start_session(&self, credential: &Credential, tier: &Tier) -> Result<SessionConnectionData> {
		let body = StartSessionRequest::new(tier.gpu_type.as_str());
		info!(
			target = "rk.gateway",
			method = "POST",
			url = %self.start_url,
			gpu_type = %body.gpu_type,
			"sending start request"
		);

		let response = with_timeout(self.start_timeout, async {
			let resp = self
				.client
				.post(&self.start_url)
				.header(AUTHORIZATION, credential.bearer())
				.json(&body)
				.send()
				.await?;

			let status = resp.status();
			info!(target = "rk.gateway", status = status.as_u16(), "received start response");
			if !status.is_success() {
				let text = resp.text().await.unwrap_or_default();
				warn!(target = "rk.gateway", status = status.as_u16(), body = %text, "start request rejected");
				return Err(ProviderError::from_start_status(status.as_u16()));
			}

			let text = resp.text().await?;
			serde_json::from_str::<StartSessionResponse>(&text).map_err(|e| ProviderError::MalformedResponse(format!("undecodable start response: {e}")))
		})
		.await?;

		debug!(
			target = "rk.gateway",
			base_url = ?response.base_url,
			instance_ip = ?response.instance_ip,
			port = ?response.port,
			"start response data"
		);

		let data = connection_data(response)?;
		info!(target = "rk.gateway", base_url = %data.base_url, "constructed base url");
		Ok(data)
	}

	async fn end_session(&self, credential: &Credential) -> Result<()> {
		info!(target = "rk.gateway", method = "POST", url = %self.end_url, "sending end request");

		with_timeout(self.end_timeout, async {
			let resp = self.client.post(&self.end_url).header(AUTHORIZATION, credential.bearer()).send().await?;
			let status = resp.status();
			info!(target = "rk.gateway", status = status.as_u16(), "received end response");
			if status.is_success() {
				Ok(())
			} else {
				Err(ProviderError::from_end_status(status.as_u16()))
			}
		})
		.await
	}
}

/// Picks the server location out of a start response.
///
/// An `instance_ip`/`port` pair wins over `baseUrl`; a response with
/// neither is malformed.
pub fn connection_data(response: StartSessionResponse) -> Result<SessionConnectionData> {
	let base_url = match (response.instance_address(), response.base_url.as_deref()) {
		(Some((ip, port)), _) => BaseUrl::from_instance(ip, port)?,
		(None, Some(raw)) if !raw.trim().is_empty() => BaseUrl::parse(raw)?,
		_ => {
			return Err(ProviderError::MalformedResponse("missing baseUrl or instance_ip/port".to_string()));
		}
	};

	Ok(SessionConnectionData {
		base_url,
		token: response.token,
	})
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
	match tokio::time::timeout(limit, fut).await {
		Ok(result) => result,
		Err(_) => {
			warn!(target = "rk.gateway", timeout_ms = limit.as_millis() as u64, "request timed out");
			Err(ProviderError::Timeout(limit))
		}
	}
}
