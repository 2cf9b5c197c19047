//! Confirmation request orchestration engine
//!
//! Every sensitive action (signing a message, sending a transaction, connecting a site, opening a
//! wallet session) becomes a uniquely identified request queued until the user decides. The
//! caller holds a [`PendingConfirmation`] future that settles exactly once: when the approval UI
//! completes the request, or when the wallet is reset.
//!
//! The queue lives in process memory only. A restart drops every pending request and the callers
//! waiting on them, integrators must not rely on requests surviving the process.
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod engine;
pub mod family;
pub mod orchestrator;

pub use confirm_common::{
    CompletionReport, ConfirmationReply, ConfirmationRequest, ConfirmationResult, Error,
    Fingerprint, FingerprintPolicy, PresentationOptions, Validator,
};

pub use self::engine::{
    BucketEvent, ConfirmationEngine, EngineContext, PendingConfirmation, QueueSnapshot, QueueSpec,
    DEFAULT_INTERNAL_ORIGIN,
};
pub use self::family::{
    AccountSigning, AuthorizeKind, AuthorizeRequest, AuthorizeResponse, ConfirmationKind, Family,
    FamilyName, SessionApproval, SessionKind, SessionProposal, SignRequest, SigningKind,
    SiteAuthorization, TransactionBroadcast, TransactionKind, TransactionRequest, WalletSession,
};
pub use self::orchestrator::{RequestOrchestrator, RequestOrchestratorBuilder, Route};
