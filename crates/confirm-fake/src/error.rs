//! Fake collaborators error

use thiserror::Error;

/// Fake collaborators error
#[derive(Debug, Error)]
pub enum Error {
    /// The signer was configured to fail
    #[error("Signer is disabled")]
    SignerDisabled,
    /// Secret key could not be parsed
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),
    /// The keyring was configured to fail
    #[error("Keyring is unavailable")]
    KeyringUnavailable,
    /// The popup was configured to fail
    #[error("Popup is unavailable")]
    PopupUnavailable,
}

impl From<Error> for confirm_common::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::SignerDisabled | Error::InvalidSecretKey(_) => Self::Signer(e.to_string()),
            Error::KeyringUnavailable => Self::Keyring(e.to_string()),
            Error::PopupUnavailable => Self::Popup(e.to_string()),
        }
    }
}
