//! Durable notebook → last-used remote kernel mapping.
//!
//! Written when a cell finishes executing against a remote kernel, read
//! when the notebook is opened again so kernel auto-selection reconnects to
//! the same live kernel instead of starting another one. Entries never
//! expire and are replaced wholesale (last write wins).
//!
//! Notebook locations are stored only as SHA-256 digests.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

const PREFERRED_SCHEMA_VERSION: u32 = 1;

/// Identifier of a kernel running on a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelId(String);

impl KernelId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for KernelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for KernelId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Stable per-notebook key derived from its persisted location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotebookIdentity(String);

impl NotebookIdentity {
	/// Key for an arbitrary location string (a path or URI).
	pub fn from_location(location: &str) -> Self {
		let digest = Sha256::digest(location.as_bytes());
		Self(format!("{digest:x}"))
	}

	/// Key for a notebook file; the path is canonicalized when it exists so
	/// different spellings of one file agree.
	pub fn from_path(path: &Path) -> Self {
		let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
		Self::from_location(&resolved.to_string_lossy())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// On-disk format of the preferred-kernel store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferredKernelFile {
	schema: u32,
	#[serde(default)]
	kernels: HashMap<String, KernelId>,
}

impl Default for PreferredKernelFile {
	fn default() -> Self {
		Self {
			schema: PREFERRED_SCHEMA_VERSION,
			kernels: HashMap::new(),
		}
	}
}

#[derive(Debug)]
pub struct PreferredKernelStore {
	path: PathBuf,
	file: Mutex<PreferredKernelFile>,
}

impl PreferredKernelStore {
	/// Opens the store at `path`. A missing or unreadable file yields an
	/// empty store; it is created on the first write.
	pub fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let file = match fs::read_to_string(&path) {
			Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
				warn!(target = "rk.preferred", path = %path.display(), error = %err, "ignoring corrupt preferred-kernel store");
				PreferredKernelFile::default()
			}),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => PreferredKernelFile::default(),
			Err(err) => {
				warn!(target = "rk.preferred", path = %path.display(), error = %err, "preferred-kernel store unreadable");
				PreferredKernelFile::default()
			}
		};
		Self {
			path,
			file: Mutex::new(file),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn get_preferred_kernel_id(&self, notebook: &NotebookIdentity) -> Option<KernelId> {
		self.file.lock().kernels.get(notebook.as_str()).cloned()
	}

	/// Records `kernel` as the notebook's preferred kernel, replacing any
	/// previous entry, and persists the store.
	pub fn set_preferred_kernel_id(&self, notebook: &NotebookIdentity, kernel: KernelId) -> Result<()> {
		let mut file = self.file.lock();
		debug!(target = "rk.preferred", notebook = notebook.as_str(), kernel = %kernel, "preferred kernel updated");
		file.kernels.insert(notebook.as_str().to_string(), kernel);
		self.save(&file)
	}

	/// Removes the notebook's entry. Returns whether one existed.
	pub fn clear_preferred_kernel_id(&self, notebook: &NotebookIdentity) -> Result<bool> {
		let mut file = self.file.lock();
		if file.kernels.remove(notebook.as_str()).is_none() {
			return Ok(false);
		}
		self.save(&file)?;
		Ok(true)
	}

	/// Picks the notebook's preferred kernel if it is among `available`.
	pub fn select_kernel<'a>(&self, notebook: &NotebookIdentity, available: &'a [KernelId]) -> Option<&'a KernelId> {
		let preferred = self.get_preferred_kernel_id(notebook)?;
		available.iter().find(|kernel| **kernel == preferred)
	}

	fn save(&self, file: &PreferredKernelFile) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent).map_err(|e| ProviderError::storage(parent, e))?;
			}
		}
		let json = serde_json::to_string_pretty(file).map_err(|e| ProviderError::storage(&self.path, e))?;
		fs::write(&self.path, json).map_err(|e| ProviderError::storage(&self.path, e))?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			if let Err(err) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)) {
				warn!(target = "rk.preferred", path = %self.path.display(), error = %err, "failed to restrict store permissions");
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn notebook(name: &str) -> NotebookIdentity {
		NotebookIdentity::from_location(&format!("/work/{name}.ipynb"))
	}

	#[test]
	fn set_then_get_returns_kernel() {
		let dir = TempDir::new().unwrap();
		let store = PreferredKernelStore::load(dir.path().join("preferred.json"));
		let nb = notebook("analysis");

		assert_eq!(store.get_preferred_kernel_id(&nb), None);
		store.set_preferred_kernel_id(&nb, KernelId::from("k1")).unwrap();
		assert_eq!(store.get_preferred_kernel_id(&nb), Some(KernelId::from("k1")));
	}

	#[test]
	fn last_write_wins() {
		let dir = TempDir::new().unwrap();
		let store = PreferredKernelStore::load(dir.path().join("preferred.json"));
		let nb = notebook("analysis");

		store.set_preferred_kernel_id(&nb, KernelId::from("k1")).unwrap();
		store.set_preferred_kernel_id(&nb, KernelId::from("k2")).unwrap();
		assert_eq!(store.get_preferred_kernel_id(&nb), Some(KernelId::from("k2")));
	}

	#[test]
	fn entries_survive_reload() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("nested/preferred.json");
		let nb = notebook("analysis");
		PreferredKernelStore::load(&path).set_preferred_kernel_id(&nb, KernelId::from("k7")).unwrap();

		let reopened = PreferredKernelStore::load(&path);
		assert_eq!(reopened.get_preferred_kernel_id(&nb), Some(KernelId::from("k7")));
		assert_eq!(reopened.get_preferred_kernel_id(&notebook("other")), None);
	}

	#[test]
	fn corrupt_store_loads_empty() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("preferred.json");
		fs::write(&path, "{ not json").unwrap();

		let store = PreferredKernelStore::load(&path);
		assert_eq!(store.get_preferred_kernel_id(&notebook("analysis")), None);
	}

	#[test]
	fn stored_keys_do_not_leak_locations() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("preferred.json");
		let store = PreferredKernelStore::load(&path);
		store.set_preferred_kernel_id(&notebook("secret-project"), KernelId::from("k1")).unwrap();

		let raw = fs::read_to_string(&path).unwrap();
		assert!(!raw.contains("secret-project"));
		assert!(raw.contains("k1"));
	}

	#[test]
	fn clear_removes_entry() {
		let dir = TempDir::new().unwrap();
		let store = PreferredKernelStore::load(dir.path().join("preferred.json"));
		let nb = notebook("analysis");
		store.set_preferred_kernel_id(&nb, KernelId::from("k1")).unwrap();

		assert!(store.clear_preferred_kernel_id(&nb).unwrap());
		assert!(!store.clear_preferred_kernel_id(&nb).unwrap());
		assert_eq!(store.get_preferred_kernel_id(&nb), None);
	}

	#[test]
	fn select_kernel_prefers_live_match() {
		let dir = TempDir::new().unwrap();
		let store = PreferredKernelStore::load(dir.path().join("preferred.json"));
		let nb = notebook("analysis");
		let live = vec![KernelId::from("k1"), KernelId::from("k2")];

		assert_eq!(store.select_kernel(&nb, &live), None);
		store.set_preferred_kernel_id(&nb, KernelId::from("k2")).unwrap();
		assert_eq!(store.select_kernel(&nb, &live), Some(&live[1]));
		store.set_preferred_kernel_id(&nb, KernelId::from("gone")).unwrap();
		assert_eq!(store.select_kernel(&nb, &live), None);
	}

	#[test]
	fn path_identity_is_stable_across_spellings() {
		let dir = TempDir::new().unwrap();
		let nb_path = dir.path().join("a.ipynb");
		fs::write(&nb_path, "{}").unwrap();
		let dotted = dir.path().join(".").join("a.ipynb");

		assert_eq!(NotebookIdentity::from_path(&nb_path), NotebookIdentity::from_path(&dotted));
		assert_eq!(NotebookIdentity::from_path(&nb_path).as_str().len(), 64);
	}
}
