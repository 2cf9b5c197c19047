//! Errors

use thiserror::Error;

/// Confirmation engine error
#[derive(Debug, Error)]
pub enum Error {
    /// An identical request (same type, origin and fingerprint) is already awaiting approval
    #[error("Duplicate request: a `{kind}` request from `{url}` is already pending")]
    DuplicateRequest {
        /// Type tag of the pending request
        kind: String,
        /// Origin of the pending request
        url: String,
    },
    /// The request id is already in use inside the family
    #[error("Request id `{0}` is already pending")]
    DuplicateId(String),
    /// No pending request matches the id
    #[error("Unable to proceed: no pending request `{0}`")]
    NotFound(String),
    /// The caller supplied validator refused the result
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// The wallet was reset while the request was pending
    #[error("Wallet was reset")]
    WalletReset,
    /// The user declined the request
    #[error("User rejected the request")]
    UserRejected,
    /// The reply carried no payload and the family can not compute one
    #[error("Result payload is required for `{0}`")]
    MissingPayload(String),
    /// Failure while computing a value on the user's behalf
    #[error("Unable to complete result: {0}")]
    Decoration(#[source] Box<Error>),
    /// Keyring access failure
    #[error("Keyring error: {0}")]
    Keyring(String),
    /// Signer failure
    #[error("Signer error: {0}")]
    Signer(String),
    /// Popup lifecycle failure
    #[error("Popup error: {0}")]
    Popup(String),
    /// Icon update failure
    #[error("Icon error: {0}")]
    Icon(String),
    /// Settings provider failure
    #[error("Settings error: {0}")]
    Settings(String),
    /// The engine dropped the request without settling it
    #[error("Error receiving settlement: {0}")]
    RecvError(String),
    /// Pubsub error
    #[error(transparent)]
    PubSub(#[from] crate::pub_sub::Error),
    /// Serde error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Custom error
    #[error("`{0}`")]
    Custom(String),
}

impl Error {
    /// Whether the error is the rejection every pending request receives on a wallet reset
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::WalletReset)
    }

    /// Whether the error is an explicit decline by the user
    pub fn is_user_rejected(&self) -> bool {
        matches!(self, Self::UserRejected)
    }

    /// Whether the error reports an identical request already awaiting approval
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateRequest { .. } | Self::DuplicateId(_))
    }
}
