//! External collaborators
//!
//! The engine never renders UI, signs or stores keys itself. These traits are the seams to the
//! components that do, injected when the engine is built.
use crate::error::Error;

/// Gate to the keyring holding the account secrets
#[async_trait::async_trait]
pub trait KeyringGate: Send + Sync {
    /// Lock the keyring, forcing a fresh authentication before the next signature
    async fn lock(&self) -> Result<(), Error>;

    /// Whether the keyring is currently locked
    async fn is_locked(&self) -> Result<bool, Error>;

    /// Unlock the keyring for the given address
    async fn unlock(&self, address: &str) -> Result<(), Error>;
}

/// Chain family signer
///
/// The payload is opaque to the engine, each family decides which bytes are signed.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Sign the payload and return the raw signature bytes
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Controller of the approval popup window
#[async_trait::async_trait]
pub trait PopupController: Send + Sync {
    /// Open a new approval window
    async fn open(&self) -> Result<(), Error>;

    /// Bring the already open approval window to the front
    async fn focus_existing(&self) -> Result<(), Error>;

    /// Close the approval window
    async fn close(&self) -> Result<(), Error>;
}

/// Updater of the extension icon badge
#[async_trait::async_trait]
pub trait IconUpdater: Send + Sync {
    /// Show the number of pending requests
    async fn update(&self, pending: usize) -> Result<(), Error>;
}

/// Read access to the wallet settings the engine depends on
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Whether every signing request must be authenticated with the password again
    async fn is_always_require_password(&self) -> Result<bool, Error>;
}
