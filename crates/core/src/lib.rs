// rk: remote Jupyter kernel servers on rented GPU instances
//
// Lists the compute tiers a user can run notebooks on, provisions a Jupyter
// server for a tier on demand, and tears sessions down when the last
// notebook closes. The host (an editor extension or the `rk` CLI) talks to
// `ServerProvider`; everything else is plumbing behind it.

pub mod config;
pub mod credential;
pub mod documents;
pub mod error;
pub mod fake_gateway;
pub mod gateway;
pub mod lifecycle;
pub mod preferred;
pub mod provider;
pub mod server;

pub use config::ProviderConfig;
pub use credential::{Credential, CredentialPrompt, CredentialStore, EnvPrompt, StaticPrompt};
pub use documents::{DocumentInfo, DocumentSet, OpenDocuments};
pub use error::{ProviderError, Result};
pub use gateway::{HttpGateway, SessionConnectionData, SessionGateway};
pub use lifecycle::{SessionHandle, SessionTracker};
pub use preferred::{KernelId, NotebookIdentity, PreferredKernelStore};
pub use provider::{ServerProvider, ServerState, ServersChanged};
pub use server::{BaseUrl, ConnectionInfo, ConnectionOptions, ServerDescriptor, ServerId, Tier, TierCollection, default_collections};
