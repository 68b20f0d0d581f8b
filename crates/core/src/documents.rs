//! Editor documents as seen by session cleanup.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

const NOTEBOOK_LANGUAGE_ID: &str = "jupyter";
const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Minimal description of an editor document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentInfo {
	pub path: PathBuf,
	pub language_id: String,
}

impl DocumentInfo {
	pub fn new(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			language_id: language_id.into(),
		}
	}

	/// Document for a notebook file on disk.
	pub fn notebook(path: impl Into<PathBuf>) -> Self {
		Self::new(path, NOTEBOOK_LANGUAGE_ID)
	}

	pub fn is_notebook(&self) -> bool {
		self.language_id == NOTEBOOK_LANGUAGE_ID || self.path.extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
	}
}

/// Snapshot of documents currently open in the host.
pub trait OpenDocuments: Send + Sync {
	fn open_documents(&self) -> Vec<DocumentInfo>;
}

/// In-memory [`OpenDocuments`] for hosts that track documents themselves.
#[derive(Debug, Default)]
pub struct DocumentSet {
	docs: Mutex<Vec<DocumentInfo>>,
}

impl DocumentSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn open(&self, doc: DocumentInfo) {
		let mut docs = self.docs.lock();
		if !docs.contains(&doc) {
			docs.push(doc);
		}
	}

	/// Removes every document at `path`; returns what was removed.
	pub fn close(&self, path: &Path) -> Vec<DocumentInfo> {
		let mut docs = self.docs.lock();
		let (closed, kept): (Vec<_>, Vec<_>) = docs.drain(..).partition(|doc| doc.path == path);
		*docs = kept;
		closed
	}
}

impl OpenDocuments for DocumentSet {
	fn open_documents(&self) -> Vec<DocumentInfo> {
		self.docs.lock().clone()
	}
}
