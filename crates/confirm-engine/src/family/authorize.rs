//! Site authorization family
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfirmationKind, Family, FamilyName};

/// Site authorization types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorizeKind {
    /// A site asks to see the wallet accounts
    ConnectSite,
}

impl fmt::Display for AuthorizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectSite => f.write_str("connect-site"),
        }
    }
}

impl ConfirmationKind for AuthorizeKind {
    type Family = SiteAuthorization;

    const ALL: &'static [Self] = &[Self::ConnectSite];
}

/// Body of a connection request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// Origin asking for access
    pub origin: String,
    /// Account types the site can handle
    #[serde(default)]
    pub account_types: Vec<String>,
}

/// Accounts the user shares with the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Selected accounts
    pub accounts: Vec<String>,
}

/// Site authorization family
#[derive(Debug, Default)]
pub struct SiteAuthorization;

#[async_trait::async_trait]
impl Family for SiteAuthorization {
    type Kind = AuthorizeKind;
    type Payload = AuthorizeRequest;
    type Output = AuthorizeResponse;

    fn name(&self) -> FamilyName {
        FamilyName::Authorize
    }
}
