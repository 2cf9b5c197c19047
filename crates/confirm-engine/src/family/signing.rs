//! Account signing family
use std::fmt;
use std::sync::Arc;

use confirm_common::{Error, FingerprintPolicy, Signer};
use serde::{Deserialize, Serialize};

use super::{sign_on_behalf, signable_bytes, ConfirmationKind, Family, FamilyName, RequestOf};
use crate::engine::EngineContext;

/// Account signing types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningKind {
    /// Sign an arbitrary message
    Sign,
    /// Sign a raw transaction without broadcasting it
    SignTransaction,
}

impl fmt::Display for SigningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sign => f.write_str("sign"),
            Self::SignTransaction => f.write_str("sign-transaction"),
        }
    }
}

impl ConfirmationKind for SigningKind {
    type Family = AccountSigning;

    const ALL: &'static [Self] = &[Self::Sign, Self::SignTransaction];
}

/// Body of a signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    /// Account expected to sign
    pub address: String,
    /// Message or transaction, `0x` prefixed hex or plain text
    pub payload: String,
}

/// Account signing family
///
/// The result is the `0x` prefixed hex signature. An empty reply is signed by the backend with
/// the stored payload.
pub struct AccountSigning {
    signer: Arc<dyn Signer>,
    fingerprint_policy: FingerprintPolicy,
}

impl fmt::Debug for AccountSigning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSigning")
            .field("fingerprint_policy", &self.fingerprint_policy)
            .finish()
    }
}

impl AccountSigning {
    /// Create the family around the account signer
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            fingerprint_policy: FingerprintPolicy::Content,
        }
    }

    /// Override how duplicate signing requests are detected
    pub fn with_fingerprint_policy(mut self, policy: FingerprintPolicy) -> Self {
        self.fingerprint_policy = policy;
        self
    }
}

#[async_trait::async_trait]
impl Family for AccountSigning {
    type Kind = SigningKind;
    type Payload = SignRequest;
    type Output = String;

    fn name(&self) -> FamilyName {
        FamilyName::Signing
    }

    fn fingerprint_policy(&self) -> FingerprintPolicy {
        self.fingerprint_policy
    }

    fn requires_authentication(&self, _kind: SigningKind) -> bool {
        true
    }

    async fn decorate(
        &self,
        request: &RequestOf<Self>,
        output: Option<String>,
        ctx: &EngineContext,
    ) -> Result<String, Error> {
        if let Some(signature) = output {
            return Ok(signature);
        }

        let message = signable_bytes(&request.payload.payload)?;
        sign_on_behalf(
            self.signer.as_ref(),
            ctx,
            &request.payload.address,
            &message,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use confirm_fake::FakeSigner;

    use super::*;

    #[test]
    fn every_signing_kind_requires_authentication() {
        let family = AccountSigning::new(Arc::new(FakeSigner::random()));
        for kind in SigningKind::ALL {
            assert!(family.requires_authentication(*kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.to_string())
            );
        }
    }

    #[test]
    fn fingerprint_policy_is_selectable() {
        let family = AccountSigning::new(Arc::new(FakeSigner::random()));
        assert_eq!(family.fingerprint_policy(), FingerprintPolicy::Content);

        let family = family.with_fingerprint_policy(FingerprintPolicy::Constant);
        assert_eq!(family.fingerprint_policy(), FingerprintPolicy::Constant);
    }
}
