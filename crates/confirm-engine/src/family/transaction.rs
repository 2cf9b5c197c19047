//! Transaction broadcast family
use std::fmt;
use std::sync::Arc;

use confirm_common::{Error, Signer};
use serde::{Deserialize, Serialize};

use super::{sign_on_behalf, ConfirmationKind, Family, FamilyName, RequestOf};
use crate::engine::EngineContext;

/// Transaction broadcast types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    /// Sign and send a transaction
    SendTransaction,
    /// Follow a transaction submitted elsewhere
    WatchTransaction,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendTransaction => f.write_str("send-transaction"),
            Self::WatchTransaction => f.write_str("watch-transaction"),
        }
    }
}

impl ConfirmationKind for TransactionKind {
    type Family = TransactionBroadcast;

    const ALL: &'static [Self] = &[Self::SendTransaction, Self::WatchTransaction];
}

/// Body of a transaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Chain the transaction targets
    pub chain: String,
    /// Sender account
    pub from: String,
    /// Recipient
    pub to: String,
    /// Transferred value, in the chain's smallest unit
    pub value: String,
    /// Call data
    #[serde(default)]
    pub data: Option<String>,
}

/// Transaction broadcast family
///
/// `send-transaction` resolves with the signature of the stored transaction, computed by the
/// backend when the reply is empty. `watch-transaction` resolves with whatever the UI sent.
pub struct TransactionBroadcast {
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for TransactionBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBroadcast").finish()
    }
}

impl TransactionBroadcast {
    /// Create the family around the transaction signer
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }
}

#[async_trait::async_trait]
impl Family for TransactionBroadcast {
    type Kind = TransactionKind;
    type Payload = TransactionRequest;
    type Output = String;

    fn name(&self) -> FamilyName {
        FamilyName::Transaction
    }

    fn requires_authentication(&self, kind: TransactionKind) -> bool {
        matches!(kind, TransactionKind::SendTransaction)
    }

    async fn decorate(
        &self,
        request: &RequestOf<Self>,
        output: Option<String>,
        ctx: &EngineContext,
    ) -> Result<String, Error> {
        match (request.kind, output) {
            (_, Some(output)) => Ok(output),
            (TransactionKind::SendTransaction, None) => {
                let message = serde_json::to_vec(&request.payload)?;
                sign_on_behalf(self.signer.as_ref(), ctx, &request.payload.from, &message).await
            }
            (TransactionKind::WatchTransaction, None) => {
                Err(Error::MissingPayload(request.kind.to_string()))
            }
        }
    }
}
