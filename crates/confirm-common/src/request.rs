//! Confirmation requests and results
//!
//! A [`ConfirmationRequest`] is what the approval UI renders, a [`ConfirmationReply`] is what it
//! sends back, and a [`ConfirmationResult`] is what the original caller finally receives.
use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{sha256, Hash};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Free-form presentation hints, never interpreted by the engine
pub type PresentationOptions = serde_json::Map<String, serde_json::Value>;

/// Caller supplied check run against the result before the caller is resolved
pub type Validator<O> = Box<dyn Fn(&ConfirmationResult<O>) -> Result<(), String> + Send + Sync>;

/// What a pending caller eventually receives
pub type Settlement<O> = Result<ConfirmationResult<O>, Error>;

/// Key used to detect semantically duplicate pending requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Placeholder used by the constant policy
    pub const CONSTANT: &'static str = "{}";

    /// The constant placeholder fingerprint
    pub fn constant() -> Self {
        Self(Self::CONSTANT.to_owned())
    }

    /// Sha256 over the type tag and the JSON encoding of the payload
    pub fn of_content<K, P>(kind: &K, payload: &P) -> Result<Self, Error>
    where
        K: Serialize,
        P: Serialize,
    {
        let encoded = serde_json::to_vec(&(kind, payload))?;
        Ok(Self(sha256::Hash::hash(&encoded).to_string()))
    }

    /// The fingerprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a family derives the [`Fingerprint`] of its requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintPolicy {
    /// Hash of the request content, identical payloads from one origin are duplicates
    #[default]
    Content,
    /// Every request of a type shares the same fingerprint, so one origin can only have one
    /// pending request per type
    Constant,
}

impl FingerprintPolicy {
    /// Compute the fingerprint of a request
    pub fn fingerprint<K, P>(&self, kind: &K, payload: &P) -> Result<Fingerprint, Error>
    where
        K: Serialize,
        P: Serialize,
    {
        match self {
            Self::Content => Fingerprint::of_content(kind, payload),
            Self::Constant => Ok(Fingerprint::constant()),
        }
    }
}

impl FromStr for FingerprintPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "constant" => Ok(Self::Constant),
            _ => Err(Error::Custom(format!("Unknown fingerprint policy: {s}"))),
        }
    }
}

/// One pending ask, as published to the approval UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest<K, P> {
    /// Request id, unique inside its family while pending
    pub id: String,
    /// Origin of the requester
    pub url: String,
    /// Whether the request comes from the wallet itself
    pub is_internal: bool,
    /// Type tag
    #[serde(rename = "type")]
    pub kind: K,
    /// Type specific request body
    pub payload: P,
    /// Duplicate detection key
    pub fingerprint: Fingerprint,
    /// Presentation hints
    #[serde(default)]
    pub options: PresentationOptions,
}

impl<K, P> ConfirmationRequest<K, P> {
    /// Whether this request and a new one from `url` with `fingerprint` are the same logical ask
    pub fn is_duplicate_of(&self, url: &str, fingerprint: &Fingerprint) -> bool {
        self.url == url && &self.fingerprint == fingerprint
    }
}

fn approved() -> bool {
    true
}

/// Decision sent back by the approval UI for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: DeserializeOwned"))]
pub struct ConfirmationReply<O> {
    /// Id of the request being answered
    pub id: String,
    /// `false` when the user declined
    #[serde(default = "approved")]
    pub is_approved: bool,
    /// Approved data, `None` asks the backend to compute it
    #[serde(
        default,
        deserialize_with = "crate::serde_utils::empty_as_none::deserialize"
    )]
    pub payload: Option<O>,
}

impl<O> ConfirmationReply<O> {
    /// Approve with the data provided by the user
    pub fn approve(id: impl Into<String>, payload: O) -> Self {
        Self {
            id: id.into(),
            is_approved: true,
            payload: Some(payload),
        }
    }

    /// Approve and let the backend compute the result
    pub fn compute(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_approved: true,
            payload: None,
        }
    }

    /// Decline the request
    pub fn reject(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_approved: false,
            payload: None,
        }
    }
}

/// Final result delivered to the original caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult<O> {
    /// Request id
    pub id: String,
    /// Approved, possibly backend computed, data
    pub payload: O,
}

/// Outcome counts of one completion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    /// Callers resolved with a result
    pub resolved: usize,
    /// Callers rejected by decline, decoration or validation
    pub rejected: usize,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn content_fingerprint_depends_on_kind_and_payload() {
        let a = Fingerprint::of_content(&"sign", &json!({"message": "hello"})).unwrap();
        let b = Fingerprint::of_content(&"sign", &json!({"message": "hello"})).unwrap();
        let c = Fingerprint::of_content(&"sign", &json!({"message": "bye"})).unwrap();
        let d = Fingerprint::of_content(&"sign-transaction", &json!({"message": "hello"})).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn constant_policy_ignores_content() {
        let policy = FingerprintPolicy::Constant;
        let a = policy.fingerprint(&"sign", &json!("one")).unwrap();
        let b = policy.fingerprint(&"sign", &json!("two")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), Fingerprint::CONSTANT);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            FingerprintPolicy::from_str("Content").unwrap(),
            FingerprintPolicy::Content
        );
        assert_eq!(
            FingerprintPolicy::from_str("constant").unwrap(),
            FingerprintPolicy::Constant
        );
        assert!(FingerprintPolicy::from_str("random").is_err());
    }

    #[test]
    fn reply_defaults_to_approved() {
        let reply: ConfirmationReply<String> =
            serde_json::from_str(r#"{"id":"r1","payload":""}"#).unwrap();
        assert_eq!(reply, ConfirmationReply::compute("r1"));

        let reply: ConfirmationReply<String> =
            serde_json::from_str(r#"{"id":"r1","is_approved":false}"#).unwrap();
        assert_eq!(reply, ConfirmationReply::reject("r1"));
    }

    #[test]
    fn request_serializes_type_tag() {
        let request = ConfirmationRequest {
            id: "r1".to_owned(),
            url: "https://dapp.example".to_owned(),
            is_internal: false,
            kind: "sign",
            payload: json!({"message": "hello"}),
            fingerprint: Fingerprint::constant(),
            options: PresentationOptions::new(),
        };

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["type"], "sign");
        assert!(request.is_duplicate_of("https://dapp.example", &Fingerprint::constant()));
        assert!(!request.is_duplicate_of("https://other.example", &Fingerprint::constant()));
    }
}
