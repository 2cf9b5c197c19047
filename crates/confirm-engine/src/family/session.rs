//! Wallet session family
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfirmationKind, Family, FamilyName};

/// Wallet session types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    /// A remote peer proposes a session
    OpenSession,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenSession => f.write_str("open-session"),
        }
    }
}

impl ConfirmationKind for SessionKind {
    type Family = WalletSession;

    const ALL: &'static [Self] = &[Self::OpenSession];
}

/// Session proposal sent by a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProposal {
    /// Peer name or origin
    pub peer: String,
    /// Chains the peer wants to use
    #[serde(default)]
    pub chains: Vec<String>,
    /// Methods the peer wants to call
    #[serde(default)]
    pub methods: Vec<String>,
}

/// Accounts exposed to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionApproval {
    /// Selected accounts
    pub accounts: Vec<String>,
}

/// Wallet session family
#[derive(Debug, Default)]
pub struct WalletSession;

#[async_trait::async_trait]
impl Family for WalletSession {
    type Kind = SessionKind;
    type Payload = SessionProposal;
    type Output = SessionApproval;

    fn name(&self) -> FamilyName {
        FamilyName::Session
    }
}
