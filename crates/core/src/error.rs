//! Error taxonomy for provisioning, cleanup and persistence.
//!
//! Every variant is `Clone` so that a single provisioning outcome can be
//! handed to all callers sharing an in-flight attempt.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::server::ServerId;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
	#[error("Unauthorized")]
	Unauthorized,

	#[error("Billing information required")]
	BillingRequired,

	#[error("Missing required field: gpuType")]
	BadRequest,

	#[error("GPU instance not available")]
	ResourceUnavailable,

	#[error("Internal error")]
	InternalProviderError,

	#[error("Unknown error occurred (HTTP {status})")]
	UnknownProviderError { status: u16 },

	#[error("Invalid response from provider: {0}")]
	MalformedResponse(String),

	#[error("Connection timed out after {}s. Please try again or check your network connection.", .0.as_secs())]
	Timeout(Duration),

	#[error("No active Jupyter session")]
	NoActiveSession,

	#[error("Already connecting to a compute server")]
	AlreadyProvisioning,

	#[error("A provider token is required to connect")]
	CredentialRequired,

	#[error("Custom server input is not supported")]
	QuickPickUnsupported,

	#[error("Server provider has been disposed")]
	Disposed,

	#[error("Unknown server: {0}")]
	UnknownServer(ServerId),

	#[error("Unknown server collection: {0}")]
	UnknownCollection(String),

	#[error("Request failed: {0}")]
	Transport(String),

	#[error("Storage error at {}: {message}", path.display())]
	Storage { path: PathBuf, message: String },
}

impl ProviderError {
	/// Maps a non-success status of `/jupyter/start`.
	pub fn from_start_status(status: u16) -> Self {
		match status {
			401 => Self::Unauthorized,
			402 => Self::BillingRequired,
			400 => Self::BadRequest,
			503 => Self::ResourceUnavailable,
			500 => Self::InternalProviderError,
			status => Self::UnknownProviderError { status },
		}
	}

	/// Maps a non-success status of `/jupyter/end`.
	pub fn from_end_status(status: u16) -> Self {
		match status {
			401 => Self::Unauthorized,
			404 => Self::NoActiveSession,
			_ => Self::InternalProviderError,
		}
	}

	pub(crate) fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
		Self::Storage {
			path: path.into(),
			message: err.to_string(),
		}
	}
}

impl From<reqwest::Error> for ProviderError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			return Self::MalformedResponse(err.to_string());
		}
		Self::Transport(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn start_status_taxonomy() {
		assert_eq!(ProviderError::from_start_status(401), ProviderError::Unauthorized);
		assert_eq!(ProviderError::from_start_status(402), ProviderError::BillingRequired);
		assert_eq!(ProviderError::from_start_status(400), ProviderError::BadRequest);
		assert_eq!(ProviderError::from_start_status(503), ProviderError::ResourceUnavailable);
		assert_eq!(ProviderError::from_start_status(500), ProviderError::InternalProviderError);
		assert_eq!(ProviderError::from_start_status(418), ProviderError::UnknownProviderError { status: 418 });
	}

	#[test]
	fn end_status_taxonomy() {
		assert_eq!(ProviderError::from_end_status(401), ProviderError::Unauthorized);
		assert_eq!(ProviderError::from_end_status(404), ProviderError::NoActiveSession);
		assert_eq!(ProviderError::from_end_status(500), ProviderError::InternalProviderError);
		assert_eq!(ProviderError::from_end_status(502), ProviderError::InternalProviderError);
	}

	#[test]
	fn timeout_message_mentions_seconds() {
		let msg = ProviderError::Timeout(Duration::from_secs(300)).to_string();
		assert!(msg.contains("300s"));
	}
}
