//! Confirmation families
//!
//! A family groups the confirmation types sharing one signing technology or flow. Each family is a
//! closed set of type tags ([`ConfirmationKind`]) with its own payload and result shapes, plus the
//! policies the generic [`ConfirmationEngine`](crate::ConfirmationEngine) consults: how requests
//! are fingerprinted, which types need a fresh authentication, and how an empty reply is completed
//! on the user's behalf.
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use confirm_common::bitcoin::hex::DisplayHex;
use confirm_common::{ConfirmationRequest, Error, FingerprintPolicy, Signer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::EngineContext;

mod authorize;
mod session;
mod signing;
mod transaction;

pub use self::authorize::{AuthorizeKind, AuthorizeRequest, AuthorizeResponse, SiteAuthorization};
pub use self::session::{SessionApproval, SessionKind, SessionProposal, WalletSession};
pub use self::signing::{AccountSigning, SignRequest, SigningKind};
pub use self::transaction::{TransactionBroadcast, TransactionKind, TransactionRequest};

/// Request shape of a family
pub type RequestOf<F> = ConfirmationRequest<<F as Family>::Kind, <F as Family>::Payload>;

/// Name of a confirmation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyName {
    /// Account signing (messages and raw transactions)
    Signing,
    /// Transaction broadcast
    Transaction,
    /// Site authorization
    Authorize,
    /// Wallet sessions
    Session,
}

impl FamilyName {
    /// Every family, in orchestrator order
    pub const ALL: [FamilyName; 4] = [
        FamilyName::Signing,
        FamilyName::Transaction,
        FamilyName::Authorize,
        FamilyName::Session,
    ];

    /// String form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::Transaction => "transaction",
            Self::Authorize => "authorize",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FamilyName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::Custom(format!("Unknown confirmation family: {s}")))
    }
}

/// Type tag of a confirmation
///
/// Every kind names the family it belongs to, so a request is routed to its engine by type alone.
pub trait ConfirmationKind:
    Copy
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Owning family
    type Family: Family<Kind = Self>;

    /// Every tag of the family
    const ALL: &'static [Self];
}

/// A confirmation family
#[async_trait::async_trait]
pub trait Family: Sized + Send + Sync + 'static {
    /// Type tags
    type Kind: ConfirmationKind;

    /// Request body
    type Payload: Clone + fmt::Debug + Eq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Result body
    type Output: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Family name
    fn name(&self) -> FamilyName;

    /// How duplicate requests are detected
    fn fingerprint_policy(&self) -> FingerprintPolicy {
        FingerprintPolicy::Content
    }

    /// Whether the type forces a fresh authentication when it is queued
    fn requires_authentication(&self, _kind: Self::Kind) -> bool {
        false
    }

    /// Complete the reply of the user.
    ///
    /// `output` is `None` when the approval UI sent the empty sentinel. Families that can compute
    /// the value on the user's behalf do it here, the others refuse the empty reply.
    async fn decorate(
        &self,
        request: &RequestOf<Self>,
        output: Option<Self::Output>,
        _ctx: &EngineContext,
    ) -> Result<Self::Output, Error> {
        output.ok_or_else(|| Error::MissingPayload(request.kind.to_string()))
    }
}

/// Sign `message` for `address`, unlocking the keyring first when needed.
///
/// With "always require password" enabled the keyring is locked again afterwards, even when the
/// signer failed.
pub(crate) async fn sign_on_behalf(
    signer: &dyn Signer,
    ctx: &EngineContext,
    address: &str,
    message: &[u8],
) -> Result<String, Error> {
    if ctx.keyring().is_locked().await? {
        ctx.keyring().unlock(address).await?;
    }

    let signed = signer.sign(message).await;

    if ctx.settings().is_always_require_password().await? {
        ctx.keyring().lock().await?;
    }

    let signature = signed?;
    Ok(format!("0x{}", signature.as_slice().to_lower_hex_string()))
}

/// Decode `0x` prefixed hex, anything else is signed as UTF-8 text
pub(crate) fn signable_bytes(payload: &str) -> Result<Vec<u8>, Error> {
    use confirm_common::bitcoin::hex::FromHex;

    match payload.strip_prefix("0x") {
        Some(hex) => Vec::<u8>::from_hex(hex)
            .map_err(|err| Error::Custom(format!("Invalid hex payload: {err}"))),
        None => Ok(payload.as_bytes().to_vec()),
    }
}
