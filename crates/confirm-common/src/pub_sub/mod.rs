//! Publish–subscribe pattern.
//!
//! A type agnostic publish-subscribe manager. Subscribers register interest in a set of topics
//! and receive every event that touches one of them through a bounded channel. Producers decide
//! which events a new subscriber receives first, so an observed value (such as the current content
//! of a queue bucket) can be replayed before any live update.
//!
//! Events are generic and must implement the [`Event`] trait.
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod error;
mod pubsub;
mod subscriber;
mod types;

pub use self::error::Error;
pub use self::pubsub::{Pubsub, SubReceiver, TopicTree, DEFAULT_CHANNEL_SIZE};
pub use self::subscriber::{ActiveSubscription, Subscriber, SubscriptionRequest};
pub use self::types::{Event, Spec};

/// Subscription Id wrapper
///
/// This is the place to add some sane default (like a max length) to the
/// subscription ID
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SubId(String);

impl From<&str> for SubId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for SubId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Deref for SubId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
