//! `/jupyter/*` control endpoints.

use serde::{Deserialize, Serialize};

/// Path of the endpoint that provisions a kernel server.
pub const START_PATH: &str = "/jupyter/start";

/// Path of the endpoint that tears down the caller's kernel server.
pub const END_PATH: &str = "/jupyter/end";

/// Body of `POST /jupyter/start`.
///
/// ```json
/// { "gpuType": "t4" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
	/// Provider name of the GPU class to provision.
	pub gpu_type: String,
}

impl StartSessionRequest {
	pub fn new(gpu_type: impl Into<String>) -> Self {
		Self { gpu_type: gpu_type.into() }
	}
}

/// Successful `POST /jupyter/start` response.
///
/// The provider reports the server location either as a complete
/// `baseUrl` or as an `instance_ip`/`port` pair. Both spellings are kept
/// verbatim; picking one is the consumer's job.
///
/// ```json
/// { "instance_ip": "10.0.0.1", "port": 8888, "token": "abc" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionResponse {
	#[serde(rename = "baseUrl", default, skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instance_ip: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	/// Jupyter server token handed to the kernel-connection layer.
	pub token: String,
}

impl StartSessionResponse {
	/// Returns the `(instance_ip, port)` pair when both halves are present
	/// and the address is non-empty.
	pub fn instance_address(&self) -> Option<(&str, u16)> {
		match (self.instance_ip.as_deref(), self.port) {
			(Some(ip), Some(port)) if !ip.trim().is_empty() => Some((ip, port)),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn start_request_uses_camel_case_field() {
		let body = serde_json::to_value(StartSessionRequest::new("t4")).unwrap();
		assert_eq!(body, json!({ "gpuType": "t4" }));
	}

	#[test]
	fn start_response_accepts_base_url_only() {
		let resp: StartSessionResponse = serde_json::from_value(json!({
			"baseUrl": "https://gpu.example.com/",
			"token": "tok"
		}))
		.unwrap();
		assert_eq!(resp.base_url.as_deref(), Some("https://gpu.example.com/"));
		assert_eq!(resp.instance_address(), None);
	}

	#[test]
	fn start_response_accepts_instance_address() {
		let resp: StartSessionResponse = serde_json::from_value(json!({
			"instance_ip": "10.0.0.1",
			"port": 8888,
			"token": "tok"
		}))
		.unwrap();
		assert_eq!(resp.instance_address(), Some(("10.0.0.1", 8888)));
	}

	#[test]
	fn instance_address_requires_both_halves() {
		let resp: StartSessionResponse = serde_json::from_value(json!({
			"instance_ip": "10.0.0.1",
			"token": "tok"
		}))
		.unwrap();
		assert_eq!(resp.instance_address(), None);
	}

	#[test]
	fn start_response_without_token_is_rejected() {
		let parsed = serde_json::from_value::<StartSessionResponse>(json!({ "baseUrl": "http://x" }));
		assert!(parsed.is_err());
	}
}
