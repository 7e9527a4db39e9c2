//! Setup-time failures.
//!
//! Only establishing a role can fail. Runtime protocol issues (transient
//! receive errors, malformed packets, a full server, a silent discovery
//! target) are absorbed where they occur and never surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The session already runs a role; stop it before starting another.
    #[error("session already active")]
    AlreadyActive,

    /// Host name did not resolve to a usable address.
    #[error("cannot resolve host '{0}'")]
    Resolve(String),

    /// Socket creation, bind, or option setup failed.
    #[error("socket setup failed: {0}")]
    Socket(#[from] std::io::Error),

    /// A packet failed to encode.
    #[error("packet encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}
