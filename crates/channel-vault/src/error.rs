//! Application error type.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Vault(#[from] channel_vault_core::Error),

    /// The owner's actor stopped before answering.
    #[error("actor for owner {0} is not running")]
    ActorStopped(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True when the request referenced a channel that is missing or inactive.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Vault(e) if e.is_not_found())
    }
}
