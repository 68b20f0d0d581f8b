//! Server identity, tier catalog and connection descriptors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProviderError, Result};

/// Stable identifier of a logical remote kernel server (one per tier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ServerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ServerId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// A provisionable class of compute server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
	pub id: ServerId,
	pub label: String,
	/// Value sent as `gpuType` when provisioning.
	pub gpu_type: String,
}

impl Tier {
	pub fn new(id: impl Into<String>, label: impl Into<String>, gpu_type: impl Into<String>) -> Self {
		Self {
			id: ServerId::new(id),
			label: label.into(),
			gpu_type: gpu_type.into(),
		}
	}

	/// Discovery-phase descriptor for this tier.
	pub fn descriptor(&self) -> ServerDescriptor {
		ServerDescriptor::unresolved(self.id.clone(), self.label.clone())
	}
}

/// Tiers registered together under one server collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCollection {
	pub id: String,
	pub label: String,
	pub tiers: Vec<Tier>,
}

impl TierCollection {
	pub fn tier(&self, id: &ServerId) -> Option<&Tier> {
		self.tiers.iter().find(|tier| &tier.id == id)
	}
}

/// Built-in catalog: one collection per GPU class.
pub fn default_collections() -> Vec<TierCollection> {
	vec![
		TierCollection {
			id: "thunder-compute-t4".to_string(),
			label: "Thunder Compute T4 Server".to_string(),
			tiers: vec![Tier::new(
				"thunder-compute-t4",
				"Thunder Compute (T4) - Cost-effective for inference and development",
				"t4",
			)],
		},
		TierCollection {
			id: "thunder-compute-a100".to_string(),
			label: "Thunder Compute A100 Server".to_string(),
			tiers: vec![Tier::new("thunder-compute-a100", "Thunder Compute (A100) - High-memory training workloads", "a100")],
		},
	]
}

/// Canonical server base URL: validated, without trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseUrl(String);

impl BaseUrl {
	pub fn parse(raw: &str) -> Result<Self> {
		let trimmed = raw.trim().trim_end_matches('/');
		if trimmed.is_empty() {
			return Err(ProviderError::MalformedResponse("empty baseUrl".to_string()));
		}
		let url = Url::parse(trimmed).map_err(|e| ProviderError::MalformedResponse(format!("invalid baseUrl {trimmed:?}: {e}")))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(ProviderError::MalformedResponse(format!("unsupported baseUrl scheme {:?}", url.scheme())));
		}
		Ok(Self(trimmed.to_string()))
	}

	/// Builds `http://{address}:{port}` from an instance address.
	pub fn from_instance(address: &str, port: u16) -> Result<Self> {
		let address = address.trim().trim_end_matches('/');
		Self::parse(&format!("http://{address}:{port}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for BaseUrl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Protocol-tuning knobs handed to the kernel-connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
	pub append_token: bool,
	/// Compression on the kernel websocket breaks some provider proxies.
	pub disable_compression: bool,
	pub websocket_timeout: Duration,
}

impl Default for ConnectionOptions {
	fn default() -> Self {
		Self {
			append_token: true,
			disable_compression: true,
			websocket_timeout: Duration::from_secs(180),
		}
	}
}

/// Resolved connection details for a kernel server.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
	base_url: BaseUrl,
	token: String,
	options: ConnectionOptions,
}

impl ConnectionInfo {
	pub fn new(base_url: BaseUrl, token: impl Into<String>, options: ConnectionOptions) -> Self {
		Self {
			base_url,
			token: token.into(),
			options,
		}
	}

	pub fn base_url(&self) -> &BaseUrl {
		&self.base_url
	}

	pub fn token(&self) -> &str {
		&self.token
	}

	pub fn options(&self) -> &ConnectionOptions {
		&self.options
	}
}

impl fmt::Debug for ConnectionInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionInfo")
			.field("base_url", &self.base_url)
			.field("token", &"<redacted>")
			.field("options", &self.options)
			.finish()
	}
}

/// Two-phase server representation: `connection_info` is `None` until resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
	pub id: ServerId,
	pub label: String,
	pub connection_info: Option<ConnectionInfo>,
}

impl ServerDescriptor {
	pub fn unresolved(id: ServerId, label: impl Into<String>) -> Self {
		Self {
			id,
			label: label.into(),
			connection_info: None,
		}
	}

	pub fn resolved(id: ServerId, label: impl Into<String>, info: ConnectionInfo) -> Self {
		Self {
			id,
			label: label.into(),
			connection_info: Some(info),
		}
	}

	pub fn is_resolved(&self) -> bool {
		self.connection_info.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn instance_address_synthesizes_plain_http_url() {
		let url = BaseUrl::from_instance("10.0.0.1", 8888).unwrap();
		assert_eq!(url.as_str(), "http://10.0.0.1:8888");
	}

	#[test]
	fn trailing_slash_variants_are_canonicalized() {
		for raw in ["http://10.0.0.1:8888", "http://10.0.0.1:8888/", "http://10.0.0.1:8888//"] {
			assert_eq!(BaseUrl::parse(raw).unwrap().as_str(), "http://10.0.0.1:8888");
		}
		assert_eq!(BaseUrl::from_instance("10.0.0.1/", 8888).unwrap().as_str(), "http://10.0.0.1:8888");
	}

	#[test]
	fn base_url_keeps_path_prefix() {
		let url = BaseUrl::parse("https://gpu.example.com/proxy/abc/").unwrap();
		assert_eq!(url.as_str(), "https://gpu.example.com/proxy/abc");
	}

	#[test]
	fn invalid_base_urls_are_malformed() {
		assert!(matches!(BaseUrl::parse(""), Err(ProviderError::MalformedResponse(_))));
		assert!(matches!(BaseUrl::parse("not a url"), Err(ProviderError::MalformedResponse(_))));
		assert!(matches!(BaseUrl::parse("ftp://host"), Err(ProviderError::MalformedResponse(_))));
	}

	#[test]
	fn connection_info_debug_redacts_token() {
		let info = ConnectionInfo::new(BaseUrl::parse("http://h:1").unwrap(), "secret-token", ConnectionOptions::default());
		let rendered = format!("{info:?}");
		assert!(!rendered.contains("secret-token"));
	}

	#[test]
	fn default_catalog_has_distinct_tier_ids() {
		let collections = default_collections();
		let t4 = collections.iter().find(|c| c.id == "thunder-compute-t4").unwrap();
		assert_eq!(t4.tiers[0].gpu_type, "t4");
		assert!(t4.tier(&ServerId::from("thunder-compute-t4")).is_some());
		assert!(t4.tier(&ServerId::from("thunder-compute-a100")).is_none());
	}
}
