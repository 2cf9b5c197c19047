//! Confirmation engine shared types and traits.
//!
//! This crate is the base foundation for the confirmation engine and the crates that host it. It
//! contains the request and result shapes handed to the approval UI, the error taxonomy, the
//! traits implemented by the external collaborators (keyring, signers, popup, icon, settings) and
//! the generic publish-subscribe manager that makes the pending queue observable.

pub mod collaborators;
pub mod error;
pub mod pub_sub;
pub mod request;
pub mod serde_utils;

// re-exporting external crates
pub use bitcoin;
pub use parking_lot;

pub use self::collaborators::{IconUpdater, KeyringGate, PopupController, SettingsProvider, Signer};
pub use self::error::Error;
pub use self::request::{
    CompletionReport, ConfirmationReply, ConfirmationRequest, ConfirmationResult, Fingerprint,
    FingerprintPolicy, PresentationOptions, Settlement, Validator,
};
