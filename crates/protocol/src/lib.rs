//! Request and response bodies of the provider's Jupyter control API.
//!
//! Only `/jupyter/start` carries a JSON payload in both directions;
//! `/jupyter/end` is a bare authenticated POST. Field names are kept as the
//! provider spells them, which is why `baseUrl` and `instance_ip` differ in
//! casing. Turning a response into a usable server URL happens in `rk`.

pub mod jupyter;

pub use jupyter::*;
